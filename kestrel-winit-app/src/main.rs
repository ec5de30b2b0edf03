mod app;
mod platform;
mod triangle;

use kestrel_crate_tools::init_log::init_log;

use crate::app::WinitApp;

fn main() -> anyhow::Result<()> {
    init_log();
    WinitApp::run()
}
