// `media-setup version`: prints the version this binary was built from.

use colored::Colorize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("{} {}", env!("CARGO_PKG_NAME").bold(), VERSION.green());
}
