//! Test fixtures: a funded pool over an in-memory store and ledger

use std::collections::BTreeMap;

use dlmm_core::state::{derive_bin_array_key, RecordKey};
use dlmm_core::store::load_record;
use dlmm_core::{
    AccountStore, AddLiquidityParams, AddLiquidityResult, Address, Bin, BinArray,
    BinLiquidityDistribution, BinLiquidityReduction, DlmmEngine, DlmmResult, EngineConfig,
    InitializePoolParams, MemoryLedger, MemoryStore, Pool, PoolKey, Position,
    RemoveLiquidityParams, RemoveLiquidityResult, SwapParams, SwapResult, TokenTransfer,
    TransferError,
};

pub mod test_constants {
    pub const BIN_STEP: u16 = 100;
    pub const FEE_BPS: u16 = 30;
    pub const STARTING_BALANCE: u64 = 1_000_000_000_000;
}

pub fn alice() -> Address {
    Address::from_label("alice")
}

pub fn bob() -> Address {
    Address::from_label("bob")
}

pub fn carol() -> Address {
    Address::from_label("carol")
}

pub fn dist(delta_id: i32, dist_x: u16, dist_y: u16) -> BinLiquidityDistribution {
    BinLiquidityDistribution {
        delta_id,
        dist_x,
        dist_y,
    }
}

pub fn burn(bin_id: i32, shares_to_burn: u128) -> BinLiquidityReduction {
    BinLiquidityReduction {
        bin_id,
        shares_to_burn,
    }
}

/// Transfer collaborator that rejects everything
#[derive(Debug, Default)]
pub struct RejectingTransfer;

impl TokenTransfer for RejectingTransfer {
    fn settle(
        &mut self,
        _pool: &PoolKey,
        _owner: &Address,
        _settlement: &dlmm_core::Settlement,
    ) -> Result<(), TransferError> {
        Err(TransferError::Rejected("transfers disabled".to_string()))
    }
}

/// One pool with bin array 0 initialized and three funded principals
pub struct TestContext {
    pub engine: DlmmEngine,
    pub store: MemoryStore,
    pub ledger: MemoryLedger,
    pub pool: PoolKey,
    pub token_x: Address,
    pub token_y: Address,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_pool(test_constants::BIN_STEP, test_constants::FEE_BPS, EngineConfig::default())
    }

    pub fn with_pool(bin_step: u16, fee_bps: u16, config: EngineConfig) -> Self {
        super::init_test_tracing();

        let engine = DlmmEngine::new(config).expect("valid config");
        let mut store = MemoryStore::new();
        let token_x = Address::from_label("TOKEN_X");
        let token_y = Address::from_label("TOKEN_Y");

        let mut params = InitializePoolParams::new(token_x, token_y, bin_step);
        params.base_fee_bps = Some(fee_bps);
        let pool = engine
            .initialize_pool(&mut store, &params)
            .expect("pool created");
        engine
            .initialize_bin_array(&mut store, &pool, 0)
            .expect("bin array created");

        let mut ledger = MemoryLedger::new();
        for owner in [alice(), bob(), carol()] {
            ledger.fund(owner, token_x, test_constants::STARTING_BALANCE);
            ledger.fund(owner, token_y, test_constants::STARTING_BALANCE);
        }

        Self {
            engine,
            store,
            ledger,
            pool,
            token_x,
            token_y,
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    pub fn add(
        &mut self,
        owner: Address,
        amount_x: u64,
        amount_y: u64,
        distribution: Vec<BinLiquidityDistribution>,
    ) -> DlmmResult<AddLiquidityResult> {
        let params = AddLiquidityParams {
            owner,
            amount_x,
            amount_y,
            distribution,
        };
        self.engine
            .add_liquidity(&mut self.store, &mut self.ledger, &self.pool, &params)
    }

    pub fn remove(
        &mut self,
        owner: Address,
        reductions: Vec<BinLiquidityReduction>,
    ) -> DlmmResult<RemoveLiquidityResult> {
        let params = RemoveLiquidityParams { owner, reductions };
        self.engine
            .remove_liquidity(&mut self.store, &mut self.ledger, &self.pool, &owner, &params)
    }

    pub fn swap(
        &mut self,
        trader: Address,
        amount_in: u64,
        min_amount_out: u64,
        swap_for_y: bool,
    ) -> DlmmResult<SwapResult> {
        let params = SwapParams {
            trader,
            amount_in,
            min_amount_out,
            swap_for_y,
            max_bins: None,
        };
        self.engine
            .swap(&mut self.store, &mut self.ledger, &self.pool, &params)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn pool_state(&self) -> Pool {
        self.engine.pool(&self.store, &self.pool).expect("pool exists")
    }

    pub fn bin(&self, bin_id: i32) -> Bin {
        self.engine
            .bin(&self.store, &self.pool, bin_id)
            .expect("bin readable")
    }

    pub fn position(&self, owner: &Address) -> Option<Position> {
        self.engine
            .position(&self.store, &self.pool, owner)
            .expect("position readable")
    }

    pub fn shares(&self, owner: &Address, bin_id: i32) -> u128 {
        self.position(owner).map_or(0, |p| p.shares_in(bin_id))
    }

    pub fn balance_x(&self, owner: &Address) -> u64 {
        self.ledger.balance(owner, &self.token_x)
    }

    pub fn balance_y(&self, owner: &Address) -> u64 {
        self.ledger.balance(owner, &self.token_y)
    }

    /// All bins carrying reserves or shares in arrays `indices`
    pub fn bins_in(&self, indices: std::ops::RangeInclusive<i32>) -> BTreeMap<i32, Bin> {
        let mut bins = BTreeMap::new();
        for index in indices {
            let key = RecordKey::BinArray(derive_bin_array_key(&self.pool, index));
            let array: Option<BinArray> =
                load_record(&self.store, &key).expect("bin array decodes");
            if let Some(array) = array {
                for (bin_id, bin) in array.iter_bins() {
                    if *bin != Bin::default() {
                        bins.insert(bin_id, *bin);
                    }
                }
            }
        }
        bins
    }

    // ========================================================================
    // Invariants
    // ========================================================================

    /// Vault balances, pool aggregates and bin reserves all agree
    pub fn assert_conservation(&self, indices: std::ops::RangeInclusive<i32>) {
        let pool = self.pool_state();
        let bins = self.bins_in(indices);
        let sum_x: u64 = bins.values().map(|b| b.reserve_x).sum();
        let sum_y: u64 = bins.values().map(|b| b.reserve_y).sum();

        assert_eq!(pool.reserve_x, sum_x, "pool reserve_x != sum of bins");
        assert_eq!(pool.reserve_y, sum_y, "pool reserve_y != sum of bins");
        assert_eq!(self.ledger.vault(&self.pool, &self.token_x), sum_x);
        assert_eq!(self.ledger.vault(&self.pool, &self.token_y), sum_y);

        let owners = [alice(), bob(), carol()];
        let external_x: u64 = owners.iter().map(|o| self.balance_x(o)).sum();
        let external_y: u64 = owners.iter().map(|o| self.balance_y(o)).sum();
        let funded = test_constants::STARTING_BALANCE * owners.len() as u64;
        assert_eq!(external_x + sum_x, funded, "token X not conserved");
        assert_eq!(external_y + sum_y, funded, "token Y not conserved");
    }

    /// Per-bin share supply equals the sum of position holdings
    pub fn assert_share_accounting(&self, indices: std::ops::RangeInclusive<i32>) {
        let bins = self.bins_in(indices);
        let mut held: BTreeMap<i32, u128> = BTreeMap::new();
        for owner in [alice(), bob(), carol()] {
            if let Some(position) = self.position(&owner) {
                for (bin_id, shares) in &position.shares {
                    assert!(*shares > 0, "zero entry left in position");
                    *held.entry(*bin_id).or_insert(0) += shares;
                }
            }
        }
        for (bin_id, bin) in &bins {
            assert_eq!(
                held.get(bin_id).copied().unwrap_or(0),
                bin.total_shares,
                "share mismatch in bin {}",
                bin_id
            );
            if bin.total_shares == 0 {
                assert_eq!((bin.reserve_x, bin.reserve_y), (0, 0), "dust in empty bin {}", bin_id);
            }
        }
        for bin_id in held.keys() {
            assert!(bins.contains_key(bin_id), "position holds shares in missing bin {}", bin_id);
        }
    }

    pub fn store_snapshot(&self) -> MemoryStore {
        self.store.clone()
    }

    pub fn record_count(&self) -> usize {
        self.store.len()
    }

    pub fn raw_record(&self, key: &RecordKey) -> Option<Vec<u8>> {
        self.store.get(key)
    }
}
