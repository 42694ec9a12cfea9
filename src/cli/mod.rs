pub mod args;

use clap::Parser;
pub use args::{Arguments, Profile};

pub fn parse() -> Arguments {
    Arguments::parse()
}
