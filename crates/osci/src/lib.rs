#![forbid(unsafe_code)]

pub use osci_core as core;
pub use osci_crypto as crypto;
pub use osci_inbound as inbound;
pub use osci_keys as keys;
pub use osci_message as message;
pub use osci_parser as parser;
pub use osci_stream as stream;
