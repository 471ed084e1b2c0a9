pub mod financing;
pub mod rates;
pub mod underwrite;
pub mod workspace;
