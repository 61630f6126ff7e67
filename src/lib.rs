pub mod bridge;
pub mod jvm;
pub mod native;
pub mod protect;
pub mod rewrite;
pub mod translate;
pub mod util;
