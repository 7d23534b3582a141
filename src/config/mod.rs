//! Site configuration (_config.yml)

mod site;

pub use site::SiteConfig;
