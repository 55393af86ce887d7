//! Drives the engine through a scenario against an in-memory store and ledger

use std::collections::BTreeSet;

use anyhow::{anyhow, bail, Result};
use dlmm_core::{
    AddLiquidityParams, Address, BinLiquidityReduction, DlmmEngine, DlmmError,
    InitializePoolParams, MemoryLedger, MemoryStore, PoolKey, RemoveLiquidityParams, SwapParams,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::scenario::{Action, Reduction, Scenario};

/// Outcome of one step
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok { result: Value },
    Error { kind: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Token totals after the run; `holds` is true when nothing was created or lost
#[derive(Debug, Clone, Serialize)]
pub struct ConservationReport {
    pub funded_x: u64,
    pub funded_y: u64,
    pub external_x: u64,
    pub external_y: u64,
    pub vault_x: u64,
    pub vault_y: u64,
    pub pool_reserve_x: u64,
    pub pool_reserve_y: u64,
    pub holds: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub name: String,
    pub steps: Vec<StepReport>,
    pub conservation: ConservationReport,
}

pub struct Runner {
    engine: DlmmEngine,
    store: MemoryStore,
    ledger: MemoryLedger,
    token_x: Address,
    token_y: Address,
    pool: Option<PoolKey>,
    principals: BTreeSet<String>,
    funded_x: u64,
    funded_y: u64,
}

impl Runner {
    pub fn new(engine: DlmmEngine, scenario: &Scenario) -> Self {
        let mut runner = Self {
            engine,
            store: MemoryStore::new(),
            ledger: MemoryLedger::new(),
            token_x: Address::from_label(&scenario.tokens.x),
            token_y: Address::from_label(&scenario.tokens.y),
            pool: None,
            principals: BTreeSet::new(),
            funded_x: 0,
            funded_y: 0,
        };

        for funding in &scenario.fund {
            let owner = runner.principal(&funding.owner);
            runner.ledger.fund(owner, runner.token_x, funding.amount_x);
            runner.ledger.fund(owner, runner.token_y, funding.amount_y);
            runner.funded_x = runner.funded_x.saturating_add(funding.amount_x);
            runner.funded_y = runner.funded_y.saturating_add(funding.amount_y);
        }
        runner
    }

    /// Run every step; an error that was not expected aborts the run
    pub fn run(mut self, scenario: &Scenario) -> Result<RunReport> {
        info!(name = %scenario.name, steps = scenario.steps.len(), "Running scenario");

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let op = step.action.name();
            debug!(index, op, "Executing step");

            let outcome = match (self.execute(&step.action), &step.expect_error) {
                (Ok(result), None) => Outcome::Ok { result },
                (Ok(_), Some(expected)) => {
                    bail!("step {} ({}) succeeded but expected {}", index, op, expected)
                }
                (Err(err), expected) => {
                    let kind = format!("{:?}", err.kind());
                    match expected {
                        Some(expected) if *expected == kind => {}
                        Some(expected) => bail!(
                            "step {} ({}) failed with {} but expected {}: {}",
                            index,
                            op,
                            kind,
                            expected,
                            err
                        ),
                        None => {
                            return Err(anyhow!(err)
                                .context(format!("step {} ({}) failed", index, op)))
                        }
                    }
                    warn!(index, op, kind = %kind, "Step failed as expected");
                    Outcome::Error {
                        kind,
                        message: err.to_string(),
                    }
                }
            };
            steps.push(StepReport {
                index,
                op,
                outcome,
            });
        }

        let conservation = self.conservation()?;
        if !conservation.holds {
            warn!(?conservation, "Conservation check failed");
        }
        Ok(RunReport {
            name: scenario.name.clone(),
            steps,
            conservation,
        })
    }

    fn principal(&mut self, label: &str) -> Address {
        self.principals.insert(label.to_string());
        Address::from_label(label)
    }

    fn pool_key(&self) -> Result<PoolKey, DlmmError> {
        self.pool.ok_or(DlmmError::PoolNotFound)
    }

    fn execute(&mut self, action: &Action) -> Result<Value, DlmmError> {
        match action {
            Action::InitPool {
                bin_step,
                active_bin_id,
                base_fee_bps,
            } => {
                let mut params = InitializePoolParams::new(self.token_x, self.token_y, *bin_step);
                params.active_bin_id = *active_bin_id;
                params.base_fee_bps = *base_fee_bps;
                let key = self.engine.initialize_pool(&mut self.store, &params)?;
                self.pool = Some(key);
                let pool = self.engine.pool(&self.store, &key)?;
                Ok(to_value(&pool))
            }
            Action::InitBinArray { index } => {
                let pool = self.pool_key()?;
                self.engine
                    .initialize_bin_array(&mut self.store, &pool, *index)?;
                Ok(serde_json::json!({ "index": index }))
            }
            Action::AddLiquidity {
                owner,
                amount_x,
                amount_y,
                distribution,
            } => {
                let pool = self.pool_key()?;
                let params = AddLiquidityParams {
                    owner: self.principal(owner),
                    amount_x: *amount_x,
                    amount_y: *amount_y,
                    distribution: distribution.clone(),
                };
                let result =
                    self.engine
                        .add_liquidity(&mut self.store, &mut self.ledger, &pool, &params)?;
                Ok(to_value(&result))
            }
            Action::RemoveLiquidity {
                owner,
                caller,
                reductions,
            } => {
                let pool = self.pool_key()?;
                let owner = self.principal(owner);
                let caller = match caller {
                    Some(label) => self.principal(label),
                    None => owner,
                };
                let params = RemoveLiquidityParams {
                    owner,
                    reductions: self.resolve_reductions(&pool, &owner, reductions)?,
                };
                let result = self.engine.remove_liquidity(
                    &mut self.store,
                    &mut self.ledger,
                    &pool,
                    &caller,
                    &params,
                )?;
                Ok(to_value(&result))
            }
            Action::Swap {
                trader,
                amount_in,
                min_amount_out,
                swap_for_y,
                max_bins,
            } => {
                let pool = self.pool_key()?;
                let params = SwapParams {
                    trader: self.principal(trader),
                    amount_in: *amount_in,
                    min_amount_out: *min_amount_out,
                    swap_for_y: *swap_for_y,
                    max_bins: *max_bins,
                };
                let result = self
                    .engine
                    .swap(&mut self.store, &mut self.ledger, &pool, &params)?;
                Ok(to_value(&result))
            }
            Action::Quote {
                amount_in,
                swap_for_y,
                max_bins,
            } => {
                let pool = self.pool_key()?;
                let quote = self.engine.quote_swap(
                    &self.store,
                    &pool,
                    *amount_in,
                    *swap_for_y,
                    *max_bins,
                )?;
                Ok(to_value(&quote))
            }
        }
    }

    /// Turn percentage reductions into share counts against the current position
    fn resolve_reductions(
        &self,
        pool: &PoolKey,
        owner: &Address,
        reductions: &[Reduction],
    ) -> Result<Vec<BinLiquidityReduction>, DlmmError> {
        let position = self.engine.position(&self.store, pool, owner)?;
        reductions
            .iter()
            .map(|r| {
                let shares_to_burn = match (r.shares, r.percent) {
                    (Some(shares), None) => shares,
                    (None, Some(percent)) if percent <= 100 => {
                        let held = position.as_ref().map_or(0, |p| p.shares_in(r.bin_id));
                        held * percent as u128 / 100
                    }
                    _ => {
                        return Err(DlmmError::InvalidConfig(
                            "reduction needs either shares or a percent of at most 100",
                        ))
                    }
                };
                Ok(BinLiquidityReduction {
                    bin_id: r.bin_id,
                    shares_to_burn,
                })
            })
            .collect()
    }

    /// Compare the ledger against the pool's recorded reserves
    fn conservation(&self) -> Result<ConservationReport> {
        let mut external_x = 0u64;
        let mut external_y = 0u64;
        for label in &self.principals {
            let owner = Address::from_label(label);
            external_x = external_x.saturating_add(self.ledger.balance(&owner, &self.token_x));
            external_y = external_y.saturating_add(self.ledger.balance(&owner, &self.token_y));
        }

        let (vault_x, vault_y, pool_reserve_x, pool_reserve_y) = match self.pool {
            Some(key) => {
                let pool = self.engine.pool(&self.store, &key)?;
                (
                    self.ledger.vault(&key, &self.token_x),
                    self.ledger.vault(&key, &self.token_y),
                    pool.reserve_x,
                    pool.reserve_y,
                )
            }
            None => (0, 0, 0, 0),
        };

        let holds = vault_x == pool_reserve_x
            && vault_y == pool_reserve_y
            && external_x.checked_add(vault_x) == Some(self.funded_x)
            && external_y.checked_add(vault_y) == Some(self.funded_y);

        Ok(ConservationReport {
            funded_x: self.funded_x,
            funded_y: self.funded_y,
            external_x,
            external_y,
            vault_x,
            vault_y,
            pool_reserve_x,
            pool_reserve_y,
            holds,
        })
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
