mod client;

pub use client::TflClient;
