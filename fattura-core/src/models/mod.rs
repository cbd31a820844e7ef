mod dettaglio;
mod documento;
mod pacchetto;
mod paziente;

pub use dettaglio::{InvoiceLine, NewInvoiceLine};
pub use documento::{DocumentType, Invoice, InvoiceStatus, NewInvoice, SdiStatus};
pub use pacchetto::{NewPackage, Package};
pub use paziente::PatientKind;
