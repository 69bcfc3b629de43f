use types::BeaconState;

#[derive(Debug, PartialEq, Clone, Default)]
pub struct JustifiedBalances {
    /// The effective balances for every validator in a given justified state.
    ///
    /// Any validator who is not active in the justified epoch carries a
    /// balance of `0`.
    pub effective_balances: Vec<u64>,
    /// The sum of `self.effective_balances`.
    pub total_effective_balance: u64,
    /// The number of active validators included in `self.effective_balances`.
    pub num_active_validators: u64,
}

impl JustifiedBalances {
    pub fn from_justified_state(state: &BeaconState) -> Self {
        Self::from_effective_balances(state.balances.clone())
    }

    pub fn from_effective_balances(effective_balances: Vec<u64>) -> Self {
        let total_effective_balance = effective_balances.iter().sum();
        let num_active_validators =
            effective_balances.iter().filter(|&&b| b > 0).count() as u64;

        Self {
            effective_balances,
            total_effective_balance,
            num_active_validators,
        }
    }
}
