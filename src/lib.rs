// src/lib.rs

pub mod models {
    pub mod allocation;
    pub mod vote;
}

pub mod services {
    pub mod aggregator;
    pub mod allocation;
    pub mod csv_io;
    pub mod decoder;
    pub mod prompt;
    pub mod rpc;
    pub mod scanner;
}
