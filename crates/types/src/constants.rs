pub mod chain_ids {
    pub const ETHEREUM: u16 = 2;
    pub const APTOS: u16 = 22;
}

pub mod address {
    pub const EMITTER_ADDRESS_SIZE: usize = 32;
    pub const ZERO_EMITTER_ADDRESS: [u8; EMITTER_ADDRESS_SIZE] = [0u8; EMITTER_ADDRESS_SIZE];
}

pub mod transaction {
    pub const TX_HASH_SIZE: usize = 32;
    /// Width of the big-endian sequence carried by an observation request.
    pub const ENCODED_SEQUENCE_SIZE: usize = 8;
}

pub mod readiness {
    pub const APTOS_SYNCING: &str = "aptos_syncing";
}

pub mod defaults {
    pub use super::chain_ids;

    pub const DEFAULT_CHAIN_ID: u16 = chain_ids::APTOS;
}
