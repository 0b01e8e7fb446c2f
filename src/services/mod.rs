pub mod availability;
pub mod dates;
pub mod invoices;
pub mod pricing;
