mod scanner;

pub use scanner::EvmScanner;
