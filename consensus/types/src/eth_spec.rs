use crate::ChainSpec;
use std::fmt::Debug;
use std::hash::Hash;

/// Per-network constants that are fixed at compile time.
pub trait EthSpec:
    'static + Clone + Copy + Default + Debug + PartialEq + Eq + Hash + Send + Sync + Unpin
{
    fn slots_per_epoch() -> u64;

    fn default_spec() -> ChainSpec;

    fn spec_name() -> &'static str;
}

/// Ethereum Foundation mainnet specification.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
pub struct MainnetEthSpec;

impl EthSpec for MainnetEthSpec {
    fn slots_per_epoch() -> u64 {
        32
    }

    fn default_spec() -> ChainSpec {
        ChainSpec::mainnet()
    }

    fn spec_name() -> &'static str {
        "mainnet"
    }
}

/// Specification for interop and testing: 8 slots per epoch.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
pub struct MinimalEthSpec;

impl EthSpec for MinimalEthSpec {
    fn slots_per_epoch() -> u64 {
        8
    }

    fn default_spec() -> ChainSpec {
        ChainSpec::minimal()
    }

    fn spec_name() -> &'static str {
        "minimal"
    }
}
