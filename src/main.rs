fn main() -> anyhow::Result<()> {
    deep_img_lib::run()
}
