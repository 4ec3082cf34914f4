mod scanner;

pub use scanner::BitcoinScanner;
