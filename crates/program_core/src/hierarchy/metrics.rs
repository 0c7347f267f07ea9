use rust_decimal::Decimal;
use serde::Serialize;

/// Roll-up figures carried by every hierarchy node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Metrics {
    pub transaction_count: i64,
    pub premium: Decimal,
    pub claims: Decimal,
    /// Percentage. For a leaf, `claims / premium × 100`; above the leaves, the
    /// unweighted mean of the children's ratios.
    pub loss_ratio: Decimal,
}

impl Metrics {
    pub fn leaf(premium: Decimal, claims: Decimal) -> Self {
        Self {
            transaction_count: 1,
            premium,
            claims,
            loss_ratio: loss_ratio(premium, claims),
        }
    }

    /// Sum counts and money over `children`; average their ratios with equal
    /// weight. No children gives all zeros.
    pub fn aggregate<'a>(children: impl IntoIterator<Item = &'a Metrics>) -> Self {
        let mut out = Metrics::default();
        let mut ratio_sum = Decimal::ZERO;
        let mut n: i64 = 0;
        for child in children {
            out.transaction_count += child.transaction_count;
            out.premium += child.premium;
            out.claims += child.claims;
            ratio_sum += child.loss_ratio;
            n += 1;
        }
        if n > 0 {
            out.loss_ratio = ratio_sum / Decimal::from(n);
        }
        out
    }

    /// `claims / premium × 100` over this node's totals. Not what `loss_ratio`
    /// holds for inner nodes; exposed for comparison.
    pub fn weighted_loss_ratio(&self) -> Decimal {
        loss_ratio(self.premium, self.claims)
    }
}

fn loss_ratio(premium: Decimal, claims: Decimal) -> Decimal {
    if premium.is_zero() {
        return Decimal::ZERO;
    }
    claims * Decimal::ONE_HUNDRED / premium
}
