/// Max length of a client label.
pub const MAX_CLIENT_LEN: usize = 120;

/// Max length of a service name snapshot.
pub const MAX_SERVICE_LEN: usize = 120;

/// Upper bound on a single appointment's price.
pub const MAX_PRICE: f64 = 1_000_000.0;

/// Max appointments the store will hold after a load.
pub const MAX_APPOINTMENTS: usize = 100_000;

/// Max length of a legacy weekday label accepted on ingest.
pub const MAX_LABEL_LEN: usize = 32;

/// Max encoded size of one journal entry; a larger length prefix is corruption.
pub const MAX_JOURNAL_ENTRY: usize = 64 * 1024;
