//! Ledger-side validation of attestation requests.
//!
//! Mirrors what an attestation provider checks before voting for a request:
//! the subject exists on the ledger, is confirmed, and the response fields
//! follow from the ledger data. A request that fails any check yields no
//! response.

use alloy_primitives::{B256, I256, U128, U256};
use attestor_client::{address_hash, Transaction, TransactionStatus};
use attestor_core::{
    BalanceDecreasingTransactionRequest, BalanceDecreasingTransactionResponse,
    ConfirmedBlockHeightExistsRequest, ConfirmedBlockHeightExistsResponse, Numeric,
    PaymentRequest, PaymentResponse, ReferencedPaymentNonexistenceRequest,
    ReferencedPaymentNonexistenceResponse, Request, RequestBody, Response,
};

use crate::chain::MockChain;

/// Response the ledger supports for `request`, without a round.
///
/// Returns `None` if the request does not hold on the ledger.
pub fn expected_response(chain: &MockChain, request: &Request) -> Option<Response> {
    if request.source_id != chain.source() {
        return None;
    }
    let response = match &request.body {
        RequestBody::Payment(req) => Response::new(payment(chain, req)?),
        RequestBody::BalanceDecreasingTransaction(req) => {
            Response::new(balance_decreasing(chain, req)?)
        },
        RequestBody::ConfirmedBlockHeightExists(req) => {
            Response::new(confirmed_block_height(chain, req)?)
        },
        RequestBody::ReferencedPaymentNonexistence(req) => {
            Response::new(referenced_payment_nonexistence(chain, req)?)
        },
    };
    Some(response)
}

fn payment(chain: &MockChain, req: &PaymentRequest) -> Option<PaymentResponse> {
    let (tx, block_number, block_timestamp) =
        confirmed_transaction(chain, &req.id, &req.block_number)?;
    let in_utxo = u8::try_from(req.in_utxo.resolve_u64("inUtxo").ok()?).ok()?;
    let utxo = u8::try_from(req.utxo.resolve_u64("utxo").ok()?).ok()?;

    let source = tx.inputs.get(usize::from(in_utxo))?.address.as_deref();
    let receiving = tx.outputs.get(usize::from(utxo))?.address.as_deref();

    let one_to_one = tx.inputs.iter().all(|i| i.address.as_deref() == source)
        && tx
            .outputs
            .iter()
            .all(|o| o.address.as_deref() == receiving || o.address.as_deref() == source);

    Some(PaymentResponse {
        block_number,
        block_timestamp,
        transaction_hash: tx.hash,
        in_utxo,
        utxo,
        source_address_hash: optional_hash(source),
        receiving_address_hash: optional_hash(receiving),
        spent_amount: signed(-balance_change(&tx, |a| Some(a) == source)),
        received_amount: if tx.status == TransactionStatus::Success {
            signed(balance_change(&tx, |a| Some(a) == receiving))
        } else {
            I256::ZERO
        },
        payment_reference: tx.reference.unwrap_or_default(),
        one_to_one,
        status: tx.status.code(),
    })
}

fn balance_decreasing(
    chain: &MockChain,
    req: &BalanceDecreasingTransactionRequest,
) -> Option<BalanceDecreasingTransactionResponse> {
    let (tx, block_number, block_timestamp) =
        confirmed_transaction(chain, &req.id, &req.block_number)?;
    let in_utxo = u8::try_from(req.in_utxo.resolve_u64("inUtxo").ok()?).ok()?;
    let source = tx.inputs.get(usize::from(in_utxo))?.address.as_deref();

    Some(BalanceDecreasingTransactionResponse {
        block_number,
        block_timestamp,
        transaction_hash: tx.hash,
        in_utxo,
        source_address_hash: optional_hash(source),
        spent_amount: signed(-balance_change(&tx, |a| Some(a) == source)),
        payment_reference: tx.reference.unwrap_or_default(),
    })
}

/// The query window starts at the newest block stamped at or before
/// `timestamp - queryWindow`.
fn confirmed_block_height(
    chain: &MockChain,
    req: &ConfirmedBlockHeightExistsRequest,
) -> Option<ConfirmedBlockHeightExistsResponse> {
    let number = req.block_number.resolve_u64("blockNumber").ok()?;
    let window = req.query_window.resolve_u64("queryWindow").ok()?;
    if !chain.is_confirmed(number) {
        return None;
    }
    let block = chain.block(number)?;
    let window_start = block.timestamp.checked_sub(window)?;

    let lowest = chain
        .blocks_between(0, number.checked_sub(1)?)
        .into_iter()
        .rev()
        .find(|b| b.timestamp <= window_start)?;
    let elapsed_ms = (block.timestamp - lowest.timestamp).saturating_mul(1000);

    Some(ConfirmedBlockHeightExistsResponse {
        block_number: number,
        block_timestamp: block.timestamp,
        number_of_confirmations: u8::try_from(chain.confirmations()).unwrap_or(u8::MAX),
        average_block_production_time_ms: elapsed_ms / (number - lowest.number),
        lowest_query_window_block_number: lowest.number,
        lowest_query_window_block_timestamp: lowest.timestamp,
    })
}

/// Holds if no successful transaction between the lower boundary and the
/// overflow block pays at least `amount` to the destination with the
/// reference.
fn referenced_payment_nonexistence(
    chain: &MockChain,
    req: &ReferencedPaymentNonexistenceRequest,
) -> Option<ReferencedPaymentNonexistenceResponse> {
    let minimal = req.minimal_block_number.resolve_u64("minimalBlockNumber").ok()?;
    let deadline_block = req.deadline_block_number.resolve_u64("deadlineBlockNumber").ok()?;
    let deadline_timestamp = req.deadline_timestamp.resolve_u64("deadlineTimestamp").ok()?;
    let amount = u128::try_from(req.amount.resolve("amount").ok()?).ok()?;
    let destination = B256::try_from(req.destination_address_hash.as_ref()).ok()?;
    let reference = B256::try_from(req.payment_reference.as_ref()).ok()?;
    if minimal > deadline_block || reference.is_zero() {
        return None;
    }

    let lower = chain.block(minimal)?;
    let overflow = first_overflow_block(chain, deadline_block, deadline_timestamp)?;
    if !chain.is_confirmed(overflow.number) {
        return None;
    }

    let paid = chain
        .blocks_between(minimal, overflow.number - 1)
        .iter()
        .flat_map(|block| block.transactions.iter())
        .filter_map(|hash| chain.transaction(hash).map(|(tx, _)| tx))
        .filter(|tx| tx.status == TransactionStatus::Success && tx.reference == Some(reference))
        .any(|tx| {
            let received = balance_change(&tx, |a| address_hash(a) == destination);
            u128::try_from(received).is_ok_and(|r| r >= amount)
        });
    if paid {
        return None;
    }

    Some(ReferencedPaymentNonexistenceResponse {
        deadline_block_number: deadline_block,
        deadline_timestamp,
        destination_address_hash: destination,
        payment_reference: reference,
        amount: U128::from(amount),
        lower_boundary_block_number: lower.number,
        lower_boundary_block_timestamp: lower.timestamp,
        first_overflow_block_number: overflow.number,
        first_overflow_block_timestamp: overflow.timestamp,
    })
}

/// First block after `deadline_block` stamped strictly after
/// `deadline_timestamp`.
pub fn first_overflow_block(
    chain: &MockChain,
    deadline_block: u64,
    deadline_timestamp: u64,
) -> Option<attestor_client::Block> {
    let mut number = deadline_block.checked_add(1)?;
    loop {
        let block = chain.block(number)?;
        if block.timestamp > deadline_timestamp {
            return Some(block);
        }
        number = number.checked_add(1)?;
    }
}

fn confirmed_transaction(
    chain: &MockChain,
    id: &[u8],
    block_number: &Numeric,
) -> Option<(Transaction, u64, u64)> {
    let hash = B256::try_from(id).ok()?;
    let (tx, number) = chain.transaction(&hash)?;
    if number != block_number.resolve_u64("blockNumber").ok()? || !chain.is_confirmed(number) {
        return None;
    }
    let block = chain.block(number)?;
    Some((tx, number, block.timestamp))
}

/// Outputs minus inputs over the entries whose address matches.
fn balance_change(tx: &Transaction, matches: impl Fn(&str) -> bool) -> i128 {
    let total = |entries: &[attestor_client::UtxoEntry]| -> i128 {
        entries
            .iter()
            .filter(|e| e.address.as_deref().is_some_and(&matches))
            .map(|e| i128::try_from(e.value).unwrap_or(i128::MAX))
            .fold(0_i128, i128::saturating_add)
    };
    total(&tx.outputs).saturating_sub(total(&tx.inputs))
}

fn optional_hash(address: Option<&str>) -> B256 {
    address.map(address_hash).unwrap_or_default()
}

fn signed(value: i128) -> I256 {
    let magnitude = I256::from_raw(U256::from(value.unsigned_abs()));
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}
