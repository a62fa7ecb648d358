use RDKinetics::Examples::rd_examples::rd_examples;
use log::{LevelFilter, error};
use simplelog::{Config, SimpleLogger};

pub fn main() {
    if let Err(e) = SimpleLogger::init(LevelFilter::Info, Config::default()) {
        eprintln!("logger initialisation failed: {}", e);
    }
    let task: usize = 1;
    if let Err(e) = rd_examples(task) {
        error!("example {} failed: {}", task, e);
    }
}
