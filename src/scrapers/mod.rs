pub mod amazon;

pub use amazon::AmazonExtractor;
