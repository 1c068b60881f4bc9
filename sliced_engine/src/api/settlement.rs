//! Prize and commission arithmetic for finished matches.
use std::env;

use log::*;
use sliced_common::Money;

use crate::{db_types::AccountId, traits::PrizeSplit};

/// The platform's cut of the pot, in basis points.
pub const PLATFORM_FEE_BPS: i64 = 2000;

const POLICY_ENV_VAR: &str = "SLICED_COMMISSION_POLICY";

/// How referrers are paid. Commission always comes out of the platform's share; the winner's
/// credit is never reduced by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommissionPolicy {
    /// No referral payouts.
    #[default]
    None,
    /// A fixed bonus to the referrer each time a referred account's deposit is applied.
    FlatPerDeposit(Money),
    /// A share of the stake (in basis points) to the winner's referrer at settlement, for stakes
    /// at or above the threshold.
    StakeShare { bps: i64, min_stake: Money },
}

impl CommissionPolicy {
    /// Reads the policy from `SLICED_COMMISSION_POLICY`. Accepted forms are `none`,
    /// `flat:<centavos>` and `share:<bps>:<min_stake_centavos>`. Anything unparsable falls back
    /// to `none` with a warning.
    pub fn from_env() -> Self {
        let Ok(raw) = env::var(POLICY_ENV_VAR) else {
            info!("{POLICY_ENV_VAR} is not set. Referral commissions are disabled.");
            return Self::None;
        };
        match Self::parse(&raw) {
            Some(policy) => policy,
            None => {
                warn!("Could not parse {POLICY_ENV_VAR}=\"{raw}\". Referral commissions are disabled.");
                Self::None
            },
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split(':');
        match parts.next()? {
            "none" => Some(Self::None),
            "flat" => {
                let centavos = parts.next()?.parse::<i64>().ok()?;
                Some(Self::FlatPerDeposit(Money::from_centavos(centavos)))
            },
            "share" => {
                let bps = parts.next()?.parse::<i64>().ok()?;
                let min_stake = parts.next()?.parse::<i64>().ok()?;
                Some(Self::StakeShare { bps, min_stake: Money::from_centavos(min_stake) })
            },
            _ => None,
        }
    }

    /// The bonus a referrer earns when a referred deposit lands, if this policy pays one.
    pub fn deposit_bonus(&self) -> Option<Money> {
        match self {
            Self::FlatPerDeposit(bonus) => Some(*bonus),
            _ => None,
        }
    }
}

/// Computes how a finished match's pot is carved up. The split always conserves the stake:
/// winner credit plus commission plus platform retention equals the pot exactly, with all
/// rounding falling in the platform's favour.
#[derive(Debug, Clone, Copy)]
pub struct SettlementEngine {
    fee_bps: i64,
    policy: CommissionPolicy,
}

impl SettlementEngine {
    pub fn new(fee_bps: i64, policy: CommissionPolicy) -> Self {
        Self { fee_bps, policy }
    }

    pub fn with_default_fee(policy: CommissionPolicy) -> Self {
        Self::new(PLATFORM_FEE_BPS, policy)
    }

    pub fn policy(&self) -> CommissionPolicy {
        self.policy
    }

    pub fn compute_split(&self, stake: Money, winner: &AccountId, referrer: Option<&AccountId>) -> PrizeSplit {
        let platform_cut = stake.take_bps(self.fee_bps);
        let winner_credit = stake - platform_cut;
        let commission = match (self.policy, referrer) {
            (CommissionPolicy::StakeShare { bps, min_stake }, Some(referrer)) if stake >= min_stake => {
                let amount = stake.take_bps(bps).min(platform_cut);
                Some((referrer.clone(), amount))
            },
            _ => None,
        };
        let commission_total = commission.as_ref().map(|(_, amount)| *amount).unwrap_or_default();
        PrizeSplit { winner: winner.clone(), winner_credit, commission, platform_retained: platform_cut - commission_total }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn winner() -> AccountId {
        "winner".into()
    }

    #[test]
    fn default_fee_takes_a_fifth_of_the_pot() {
        let engine = SettlementEngine::with_default_fee(CommissionPolicy::None);
        let split = engine.compute_split(Money::from_reais(100), &winner(), None);
        assert_eq!(split.winner_credit, Money::from_reais(80));
        assert_eq!(split.platform_retained, Money::from_reais(20));
        assert_eq!(split.commission, None);
        assert_eq!(split.total(), Money::from_reais(100));
    }

    #[test]
    fn stake_share_commission_comes_out_of_the_platform_cut() {
        let policy = CommissionPolicy::StakeShare { bps: 500, min_stake: Money::from_reais(50) };
        let engine = SettlementEngine::with_default_fee(policy);
        let referrer = AccountId::from("referrer");
        let split = engine.compute_split(Money::from_reais(100), &winner(), Some(&referrer));
        assert_eq!(split.winner_credit, Money::from_reais(80));
        assert_eq!(split.commission, Some((referrer, Money::from_reais(5))));
        assert_eq!(split.platform_retained, Money::from_reais(15));
        assert_eq!(split.total(), Money::from_reais(100));
    }

    #[test]
    fn no_commission_below_the_stake_threshold_or_without_a_referrer() {
        let policy = CommissionPolicy::StakeShare { bps: 500, min_stake: Money::from_reais(50) };
        let engine = SettlementEngine::with_default_fee(policy);
        let referrer = AccountId::from("referrer");
        let below = engine.compute_split(Money::from_reais(30), &winner(), Some(&referrer));
        assert_eq!(below.commission, None);
        assert_eq!(below.total(), Money::from_reais(30));
        let unreferred = engine.compute_split(Money::from_reais(100), &winner(), None);
        assert_eq!(unreferred.commission, None);
    }

    #[test]
    fn odd_pots_round_in_the_platforms_favour() {
        let engine = SettlementEngine::with_default_fee(CommissionPolicy::None);
        let split = engine.compute_split(Money::from_centavos(999), &winner(), None);
        assert_eq!(split.winner_credit, Money::from_centavos(800));
        assert_eq!(split.platform_retained, Money::from_centavos(199));
        assert_eq!(split.total(), Money::from_centavos(999));
    }

    #[test]
    fn policy_parsing() {
        assert_eq!(CommissionPolicy::parse("none"), Some(CommissionPolicy::None));
        assert_eq!(CommissionPolicy::parse("flat:500"), Some(CommissionPolicy::FlatPerDeposit(Money::from_reais(5))));
        assert_eq!(
            CommissionPolicy::parse("share:1000:5000"),
            Some(CommissionPolicy::StakeShare { bps: 1000, min_stake: Money::from_reais(50) })
        );
        assert_eq!(CommissionPolicy::parse("bogus"), None);
        assert_eq!(CommissionPolicy::parse("flat:lots"), None);
    }
}
