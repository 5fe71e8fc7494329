//! Block-level execution and validation.

use std::rc::Rc;

use primitive_types::{H160, U256};
use steadvm::{
    BlockError, BlockParams, HeaderParams, HomesteadPatch, LogsBloom, MemoryDatabase, OmmerParams,
    SeqBlockVM, StateManager, TransactionAction, ValidTransaction,
};

fn block_reward() -> U256 {
    U256::from(5_000_000_000_000_000_000u64)
}

fn state() -> StateManager<MemoryDatabase> {
    StateManager::with_empty(MemoryDatabase::default()).unwrap()
}

fn miner() -> H160 {
    H160::repeat_byte(0xcc)
}

fn block(gas_limit: u64) -> BlockParams {
    BlockParams {
        header: HeaderParams {
            beneficiary: miner(),
            timestamp: 1_500_000_000,
            number: U256::from(1_150_010u64),
            difficulty: U256::from(0x0200_0000u64),
            gas_limit: U256::from(gas_limit),
            block_hashes: Vec::new(),
        },
        ..Default::default()
    }
}

fn transfer(sender: H160, recipient: H160, value: u64, nonce: u64) -> ValidTransaction {
    ValidTransaction {
        caller: sender,
        gas_price: U256::one(),
        gas_limit: U256::from(21_000u64),
        action: TransactionAction::Call(recipient),
        value: U256::from(value),
        input: Rc::new(Vec::new()),
        nonce,
    }
}

#[test]
fn generates_receipts_and_pays_rewards() {
    let sender = H160::repeat_byte(0x01);
    let recipient = H160::repeat_byte(0x02);

    let mut handle = state();
    handle
        .add_balance(sender, U256::from(10_000_000u64))
        .unwrap();
    handle.flush().unwrap();

    let transactions = vec![
        transfer(sender, recipient, 100, 0),
        transfer(sender, recipient, 200, 1),
    ];

    let vm = SeqBlockVM::<HomesteadPatch>::new();
    let outcome = vm
        .fire(&mut handle, &block(8_000_000), &transactions, true)
        .unwrap();

    assert_eq!(outcome.receipts.len(), 2);
    assert_eq!(outcome.gas_used, U256::from(42_000u64));
    assert_eq!(outcome.receipts[0].gas_used, U256::from(21_000u64));
    assert_eq!(outcome.receipts[1].gas_used, U256::from(42_000u64));
    // Plain transfers emit nothing.
    assert!(outcome.logs_bloom.is_zero());
    assert_eq!(outcome.state_root, handle.root());

    assert_eq!(
        handle.get_balance(recipient).unwrap(),
        U256::from(300u64)
    );
    // Fees plus the block reward.
    assert_eq!(
        handle.get_balance(miner()).unwrap(),
        U256::from(42_000u64) + block_reward()
    );
}

#[test]
fn pays_ommer_and_nibling_rewards() {
    let ommer_beneficiary = H160::repeat_byte(0x0e);

    let mut handle = state();
    let mut params = block(8_000_000);
    params.ommers.push(OmmerParams {
        beneficiary: ommer_beneficiary,
        number: params.header.number - U256::from(2u64),
    });

    let vm = SeqBlockVM::<HomesteadPatch>::new();
    vm.fire(&mut handle, &params, &[], true).unwrap();

    // Miner: base reward plus one nibling share.
    assert_eq!(
        handle.get_balance(miner()).unwrap(),
        block_reward() + block_reward() / U256::from(32u64)
    );
    // Ommer at distance two: 6/8 of the base reward.
    assert_eq!(
        handle.get_balance(ommer_beneficiary).unwrap(),
        block_reward() * U256::from(6u64) / U256::from(8u64)
    );
}

#[test]
fn transaction_over_block_gas_limit_rejected() {
    let sender = H160::repeat_byte(0x01);
    let mut handle = state();
    handle
        .add_balance(sender, U256::from(10_000_000u64))
        .unwrap();

    let transactions = vec![transfer(sender, H160::repeat_byte(0x02), 1, 0)];
    let vm = SeqBlockVM::<HomesteadPatch>::new();
    let err = vm
        .fire(&mut handle, &block(20_000), &transactions, false)
        .unwrap_err();
    assert_eq!(err, BlockError::TxGasLimitExceedsBlock);
    assert_eq!(format!("{}", err), "tx has a higher gas limit than the block");
}

#[test]
fn validation_checks_claimed_header_values() {
    let sender = H160::repeat_byte(0x01);

    let mut seed = state();
    seed.add_balance(sender, U256::from(10_000_000u64)).unwrap();
    let root = seed.flush().unwrap();
    let database = |handle: &StateManager<MemoryDatabase>| handle.database().clone();

    // First generate the truth, then validate against it.
    let transactions = vec![transfer(sender, H160::repeat_byte(0x02), 100, 0)];
    let vm = SeqBlockVM::<HomesteadPatch>::new();
    let outcome = vm
        .fire(&mut seed, &block(8_000_000), &transactions, true)
        .unwrap();

    let mut replay = StateManager::new(database(&seed), root).unwrap();
    let mut params = block(8_000_000);
    params.state_root = outcome.state_root;
    params.receipts_root = outcome.receipts_root;
    params.logs_bloom = outcome.logs_bloom;
    params.gas_used = outcome.gas_used;
    vm.fire(&mut replay, &params, &transactions, false).unwrap();

    // A wrong gas-used claim is rejected.
    let mut replay = StateManager::new(database(&seed), root).unwrap();
    params.gas_used = U256::from(1u64);
    let err = vm
        .fire(&mut replay, &params, &transactions, false)
        .unwrap_err();
    assert_eq!(err, BlockError::InvalidGasUsed);
    assert_eq!(format!("{}", err), "invalid gasUsed");

    // A wrong state-root claim is rejected.
    let mut replay = StateManager::new(database(&seed), root).unwrap();
    params.gas_used = outcome.gas_used;
    params.state_root = Default::default();
    let err = vm
        .fire(&mut replay, &params, &transactions, false)
        .unwrap_err();
    assert_eq!(err, BlockError::InvalidStateRoot);
}

#[test]
fn per_transaction_hooks_observe_execution() {
    use std::cell::RefCell;
    use std::rc::Rc as StdRc;

    let sender = H160::repeat_byte(0x01);
    let mut handle = state();
    handle
        .add_balance(sender, U256::from(10_000_000u64))
        .unwrap();

    let seen: StdRc<RefCell<Vec<usize>>> = StdRc::new(RefCell::new(Vec::new()));
    let seen_in_hook = seen.clone();

    let mut vm = SeqBlockVM::<HomesteadPatch>::new();
    vm.on_before_transaction(move |index, _| {
        seen_in_hook.borrow_mut().push(index);
    });

    let transactions = vec![
        transfer(sender, H160::repeat_byte(0x02), 1, 0),
        transfer(sender, H160::repeat_byte(0x02), 1, 1),
    ];
    vm.fire(&mut handle, &block(8_000_000), &transactions, true)
        .unwrap();

    assert_eq!(*seen.borrow(), vec![0, 1]);
}

#[test]
fn empty_bloom_matches_default() {
    assert!(LogsBloom::default().is_zero());
}
