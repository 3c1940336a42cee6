mod api;
mod pages;

pub use api::*;
pub use pages::*;

#[cfg(test)]
mod tests;
