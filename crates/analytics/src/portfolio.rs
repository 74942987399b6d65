//! Portfolio analysis: per-position metrics, summary, market allocation
//! and concentration risk.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stocklens_core::traits::PositionSide;
use stocklens_core::Market;

/// One position as fed into the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInput {
    pub market: Market,
    pub code: String,
    pub name: Option<String>,
    pub qty: f64,
    pub cost_price: Option<f64>,
    pub market_price: Option<f64>,
    pub market_value: Option<f64>,
    pub pl_value: Option<f64>,
    pub pl_ratio: Option<f64>,
    pub side: PositionSide,
}

impl PositionInput {
    fn effective_market_value(&self) -> f64 {
        if let Some(mv) = self.market_value {
            return mv;
        }
        match self.market_price {
            Some(price) => price * self.qty,
            None => 0.0,
        }
    }

    fn cost_value(&self) -> Option<f64> {
        self.cost_price.map(|c| c * self.qty)
    }
}

/// Per-position derived metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionMetrics {
    pub market: Market,
    pub code: String,
    pub name: Option<String>,
    pub qty: f64,
    pub cost_price: Option<f64>,
    pub market_price: Option<f64>,
    pub market_value: f64,
    pub cost_value: Option<f64>,
    pub pl_value: Option<f64>,
    /// Fractional return on cost, e.g. 0.08 for +8%.
    pub pl_ratio: Option<f64>,
    /// Fraction of the portfolio market value, in [0, 1].
    pub weight: f64,
    pub side: PositionSide,
}

impl PositionMetrics {
    #[must_use]
    pub fn full_code(&self) -> String {
        format!("{}.{}", self.market, self.code)
    }
}

/// Portfolio-level summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub position_count: usize,
    pub long_count: usize,
    pub short_count: usize,
    pub total_market_value: f64,
    pub total_cost_value: f64,
    pub total_pl_value: f64,
    /// Fractional return on total cost.
    pub total_pl_ratio: f64,
    pub profitable_count: usize,
    pub losing_count: usize,
    /// Fraction of positions with positive P&L, in [0, 1].
    pub win_rate: f64,
    pub largest_position_weight: f64,
    pub top5_concentration: f64,
    pub avg_position_value: f64,
    pub cash_balance: Option<f64>,
    pub total_assets: Option<f64>,
    pub cash_weight: Option<f64>,
}

/// Grouping of positions by market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAllocation {
    pub market: Market,
    pub position_count: usize,
    pub market_value: f64,
    /// Fraction of portfolio market value.
    pub weight: f64,
    pub pl_value: f64,
    pub pl_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcentrationRisk {
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Herfindahl-Hirschman index over position weights, in [0, 10000].
    pub hhi: f64,
    pub concentration_risk: ConcentrationRisk,
    /// In [0, 100], higher is more diversified.
    pub diversification_score: f64,
    pub largest_loss_position: Option<String>,
    pub largest_loss_ratio: f64,
    pub total_unrealized_loss: f64,
    /// Fraction of positions currently at a loss.
    pub positions_at_loss_ratio: f64,
    pub signals: Vec<String>,
}

impl Default for ConcentrationRisk {
    fn default() -> Self {
        Self::Low
    }
}

/// Complete analysis result. Performer lists hold indices into
/// `positions` rather than back-references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioAnalysis {
    pub analysis_date: NaiveDate,
    pub summary: PortfolioSummary,
    pub positions: Vec<PositionMetrics>,
    pub market_allocation: Vec<MarketAllocation>,
    pub risk: RiskMetrics,
    pub top_performers: Vec<usize>,
    pub bottom_performers: Vec<usize>,
    pub signals: Vec<String>,
}

/// Analyzer thresholds; percentages expressed as fractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioAnalyzerConfig {
    pub top_n_performers: usize,
    /// Largest-weight bands for concentration risk.
    pub medium_weight: f64,
    pub high_weight: f64,
    pub very_high_weight: f64,
    /// Signal thresholds.
    pub hhi_alert: f64,
    pub min_positions: usize,
    pub top5_alert: f64,
    pub deep_loss_ratio: f64,
}

impl Default for PortfolioAnalyzerConfig {
    fn default() -> Self {
        Self {
            top_n_performers: 5,
            medium_weight: 0.10,
            high_weight: 0.20,
            very_high_weight: 0.30,
            hhi_alert: 2500.0,
            min_positions: 5,
            top5_alert: 0.80,
            deep_loss_ratio: -0.20,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PortfolioAnalyzer {
    config: PortfolioAnalyzerConfig,
}

impl PortfolioAnalyzer {
    #[must_use]
    pub fn new(config: PortfolioAnalyzerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn analyze(
        &self,
        positions: &[PositionInput],
        cash: Option<f64>,
        total_assets: Option<f64>,
        analysis_date: NaiveDate,
    ) -> PortfolioAnalysis {
        let active: Vec<&PositionInput> =
            positions.iter().filter(|p| p.qty.abs() > 0.0).collect();

        if active.is_empty() {
            return self.empty_analysis(cash, total_assets, analysis_date);
        }

        let metrics = Self::position_metrics(&active);
        let summary = self.summary(&metrics, cash, total_assets);
        let market_allocation = Self::market_allocation(&metrics, summary.total_market_value);
        let risk = self.risk_metrics(&metrics, &summary);
        let (top, bottom) = self.performers(&metrics);
        let signals = self.signals(&summary, &risk);

        PortfolioAnalysis {
            analysis_date,
            summary,
            positions: metrics,
            market_allocation,
            risk,
            top_performers: top,
            bottom_performers: bottom,
            signals,
        }
    }

    fn empty_analysis(
        &self,
        cash: Option<f64>,
        total_assets: Option<f64>,
        analysis_date: NaiveDate,
    ) -> PortfolioAnalysis {
        let mut summary = PortfolioSummary {
            cash_balance: cash,
            total_assets,
            ..PortfolioSummary::default()
        };
        if let (Some(cash), Some(assets)) = (cash, total_assets) {
            if assets > 0.0 {
                summary.cash_weight = Some(cash / assets);
            }
        }
        PortfolioAnalysis {
            analysis_date,
            summary,
            positions: Vec::new(),
            market_allocation: Vec::new(),
            risk: RiskMetrics::default(),
            top_performers: Vec::new(),
            bottom_performers: Vec::new(),
            signals: vec!["no active positions".to_string()],
        }
    }

    fn position_metrics(active: &[&PositionInput]) -> Vec<PositionMetrics> {
        let total_mv: f64 = active.iter().map(|p| p.effective_market_value()).sum();

        active
            .iter()
            .map(|p| {
                let market_value = p.effective_market_value();
                let cost_value = p.cost_value();
                let pl_value = p.pl_value.or_else(|| {
                    cost_value.map(|cost| {
                        (market_value - cost) * p.side.sign()
                    })
                });
                let pl_ratio = p.pl_ratio.or_else(|| match (pl_value, cost_value) {
                    (Some(pl), Some(cost)) if cost != 0.0 => Some(pl / cost),
                    _ => None,
                });
                let weight = if total_mv > 0.0 {
                    market_value / total_mv
                } else {
                    0.0
                };
                PositionMetrics {
                    market: p.market,
                    code: p.code.clone(),
                    name: p.name.clone(),
                    qty: p.qty,
                    cost_price: p.cost_price,
                    market_price: p.market_price,
                    market_value,
                    cost_value,
                    pl_value,
                    pl_ratio,
                    weight,
                    side: p.side,
                }
            })
            .collect()
    }

    fn summary(
        &self,
        metrics: &[PositionMetrics],
        cash: Option<f64>,
        total_assets: Option<f64>,
    ) -> PortfolioSummary {
        let mut summary = PortfolioSummary {
            position_count: metrics.len(),
            cash_balance: cash,
            total_assets,
            ..PortfolioSummary::default()
        };

        for p in metrics {
            match p.side {
                PositionSide::Long => summary.long_count += 1,
                PositionSide::Short => summary.short_count += 1,
            }
            summary.total_market_value += p.market_value;
            if let Some(cost) = p.cost_value {
                summary.total_cost_value += cost;
            }
            if let Some(pl) = p.pl_value {
                summary.total_pl_value += pl;
                if pl > 0.0 {
                    summary.profitable_count += 1;
                } else if pl < 0.0 {
                    summary.losing_count += 1;
                }
            }
        }

        let with_pl = metrics.iter().filter(|p| p.pl_value.is_some()).count();
        if with_pl > 0 {
            summary.win_rate = summary.profitable_count as f64 / with_pl as f64;
        }
        if summary.total_cost_value > 0.0 {
            summary.total_pl_ratio = summary.total_pl_value / summary.total_cost_value;
        }

        let mut weights: Vec<f64> = metrics.iter().map(|p| p.weight).collect();
        weights.sort_by(|a, b| b.total_cmp(a));
        summary.largest_position_weight = weights.first().copied().unwrap_or(0.0);
        summary.top5_concentration = weights.iter().take(5).sum();

        if !metrics.is_empty() {
            summary.avg_position_value = summary.total_market_value / metrics.len() as f64;
        }
        if let (Some(cash), Some(assets)) = (cash, total_assets) {
            if assets > 0.0 {
                summary.cash_weight = Some(cash / assets);
            }
        }

        summary
    }

    fn market_allocation(metrics: &[PositionMetrics], total_mv: f64) -> Vec<MarketAllocation> {
        let mut allocations: Vec<MarketAllocation> = Vec::new();
        for p in metrics {
            if let Some(existing) = allocations.iter_mut().find(|a| a.market == p.market) {
                existing.position_count += 1;
                existing.market_value += p.market_value;
                existing.pl_value += p.pl_value.unwrap_or(0.0);
            } else {
                allocations.push(MarketAllocation {
                    market: p.market,
                    position_count: 1,
                    market_value: p.market_value,
                    weight: 0.0,
                    pl_value: p.pl_value.unwrap_or(0.0),
                    pl_ratio: 0.0,
                });
            }
        }

        for allocation in &mut allocations {
            if total_mv > 0.0 {
                allocation.weight = allocation.market_value / total_mv;
            }
            let cost: f64 = metrics
                .iter()
                .filter(|p| p.market == allocation.market)
                .filter_map(|p| p.cost_value)
                .sum();
            if cost > 0.0 {
                allocation.pl_ratio = allocation.pl_value / cost;
            }
        }

        allocations.sort_by(|a, b| b.market_value.total_cmp(&a.market_value));
        allocations
    }

    fn risk_metrics(&self, metrics: &[PositionMetrics], summary: &PortfolioSummary) -> RiskMetrics {
        let cfg = &self.config;
        let mut risk = RiskMetrics::default();

        risk.hhi = metrics.iter().map(|p| p.weight * p.weight).sum::<f64>() * 10_000.0;

        // Perfect diversification over n positions puts HHI at 10000/n.
        let min_hhi = if metrics.is_empty() {
            10_000.0
        } else {
            10_000.0 / metrics.len() as f64
        };
        risk.diversification_score = if risk.hhi > min_hhi {
            (100.0 * (1.0 - (risk.hhi - min_hhi) / (10_000.0 - min_hhi))).max(0.0)
        } else {
            100.0
        };

        risk.concentration_risk = if summary.largest_position_weight > cfg.very_high_weight {
            ConcentrationRisk::VeryHigh
        } else if summary.largest_position_weight > cfg.high_weight {
            ConcentrationRisk::High
        } else if summary.largest_position_weight > cfg.medium_weight
            || summary.top5_concentration > cfg.top5_alert
        {
            ConcentrationRisk::Medium
        } else {
            ConcentrationRisk::Low
        };

        let mut losing: Vec<&PositionMetrics> = metrics
            .iter()
            .filter(|p| p.pl_value.is_some_and(|v| v < 0.0))
            .collect();
        risk.total_unrealized_loss = losing.iter().filter_map(|p| p.pl_value).sum();
        if !metrics.is_empty() {
            risk.positions_at_loss_ratio = losing.len() as f64 / metrics.len() as f64;
        }
        losing.sort_by(|a, b| {
            a.pl_value
                .unwrap_or(0.0)
                .total_cmp(&b.pl_value.unwrap_or(0.0))
        });
        if let Some(worst) = losing.first() {
            risk.largest_loss_position = Some(worst.full_code());
            risk.largest_loss_ratio = worst.pl_ratio.unwrap_or(0.0);
        }

        if matches!(
            risk.concentration_risk,
            ConcentrationRisk::High | ConcentrationRisk::VeryHigh
        ) {
            risk.signals.push(format!(
                "single position >{:.0}%: largest is {:.1}% of portfolio",
                cfg.high_weight * 100.0,
                summary.largest_position_weight * 100.0
            ));
        }
        if risk.hhi > cfg.hhi_alert {
            risk.signals
                .push(format!("highly concentrated portfolio (HHI {:.0})", risk.hhi));
        }
        if risk.positions_at_loss_ratio > 0.5 {
            risk.signals.push(format!(
                "{:.0}% of positions are at a loss",
                risk.positions_at_loss_ratio * 100.0
            ));
        }
        if risk.largest_loss_ratio < cfg.deep_loss_ratio {
            if let Some(code) = &risk.largest_loss_position {
                risk.signals.push(format!(
                    "deep loss position: {} ({:.1}%)",
                    code,
                    risk.largest_loss_ratio * 100.0
                ));
            }
        }

        risk
    }

    /// Top/bottom by `pl_ratio`; ties break on |pl_value| then code.
    fn performers(&self, metrics: &[PositionMetrics]) -> (Vec<usize>, Vec<usize>) {
        let mut ranked: Vec<usize> = (0..metrics.len())
            .filter(|&i| metrics[i].pl_ratio.is_some())
            .collect();
        ranked.sort_by(|&a, &b| {
            let (pa, pb) = (&metrics[a], &metrics[b]);
            pb.pl_ratio
                .unwrap_or(0.0)
                .total_cmp(&pa.pl_ratio.unwrap_or(0.0))
                .then_with(|| {
                    pb.pl_value
                        .unwrap_or(0.0)
                        .abs()
                        .total_cmp(&pa.pl_value.unwrap_or(0.0).abs())
                })
                .then_with(|| pa.code.cmp(&pb.code))
        });

        let n = self.config.top_n_performers;
        let top: Vec<usize> = ranked.iter().take(n).copied().collect();
        let bottom: Vec<usize> = ranked.iter().rev().take(n).copied().collect();
        (top, bottom)
    }

    fn signals(&self, summary: &PortfolioSummary, risk: &RiskMetrics) -> Vec<String> {
        let cfg = &self.config;
        let mut signals = Vec::new();

        if summary.total_pl_ratio > 0.20 {
            signals.push(format!(
                "strong performance: {:.1}% total gain",
                summary.total_pl_ratio * 100.0
            ));
        } else if summary.total_pl_ratio < -0.10 {
            signals.push(format!(
                "underperforming: {:.1}% total loss",
                summary.total_pl_ratio * 100.0
            ));
        }

        if summary.win_rate >= 0.70 {
            signals.push(format!(
                "high win rate: {:.0}% of positions profitable",
                summary.win_rate * 100.0
            ));
        } else if summary.win_rate <= 0.30 && summary.position_count > 0 {
            signals.push(format!(
                "low win rate: {:.0}% of positions profitable",
                summary.win_rate * 100.0
            ));
        }

        if summary.position_count < cfg.min_positions {
            signals.push(format!(
                "low diversification: fewer than {} positions",
                cfg.min_positions
            ));
        }

        if summary.top5_concentration > cfg.top5_alert {
            signals.push(format!(
                "top 5 positions hold {:.1}% of the portfolio",
                summary.top5_concentration * 100.0
            ));
        }

        if let Some(cash_weight) = summary.cash_weight {
            if cash_weight > 0.5 {
                signals.push(format!("high cash position: {:.1}%", cash_weight * 100.0));
            } else if cash_weight < 0.05 {
                signals.push(format!("low cash reserve: {:.1}%", cash_weight * 100.0));
            }
        }

        signals.extend(risk.signals.iter().cloned());
        signals
    }
}
