mod app;
pub use app::App;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let app = App::new()?;
    app.run()?;

    Ok(())
}
