pub mod phylogeny;
pub mod report;
pub mod typing;
