//! Transaction skeletons and capacity balancing.
//!
//! A skeleton goes through two phases. While `Collecting` it accepts
//! inputs; `finalize_inputs` freezes their order, after which the first
//! input can be read (some scripts derive their args from it) and outputs
//! can be added. Balancing turns the skeleton into a `BuiltTransaction`
//! whose capacity is conserved: inputs == outputs + fee.

use crate::config::WorkflowParams;
use crate::error::{Error, Result};
use ckb_types::{
    bytes::Bytes,
    core::{Capacity, TransactionBuilder, TransactionView},
    packed::{self, CellDep, CellInput, CellOutput, Script},
    prelude::*,
};
use crosschain_traits::LiveCell;
use log::warn;
use std::marker::PhantomData;

pub struct Collecting;
pub struct InputsFinalized;

pub struct TxSkeleton<S> {
    cell_deps: Vec<CellDep>,
    inputs: Vec<LiveCell>,
    outputs: Vec<CellOutput>,
    outputs_data: Vec<Bytes>,
    fee: u64,
    _stage: PhantomData<S>,
}

impl<S> TxSkeleton<S> {
    /// Duplicated deps are dropped, first occurrence wins.
    pub fn cell_dep(mut self, cell_dep: CellDep) -> Self {
        if !self.cell_deps.contains(&cell_dep) {
            self.cell_deps.push(cell_dep);
        }
        self
    }

    pub fn cell_deps(self, cell_deps: impl IntoIterator<Item = CellDep>) -> Self {
        cell_deps
            .into_iter()
            .fold(self, |skeleton, dep| skeleton.cell_dep(dep))
    }

    pub fn input_capacity(&self) -> Result<u64> {
        sum_capacity(self.inputs.iter().map(LiveCell::capacity))
    }
}

impl TxSkeleton<Collecting> {
    pub fn new(fee: u64) -> Self {
        Self {
            cell_deps: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            outputs_data: Vec::new(),
            fee,
            _stage: PhantomData,
        }
    }

    pub fn input(mut self, cell: LiveCell) -> Self {
        self.inputs.push(cell);
        self
    }

    pub fn inputs(mut self, cells: impl IntoIterator<Item = LiveCell>) -> Self {
        self.inputs.extend(cells);
        self
    }

    pub fn finalize_inputs(self) -> Result<TxSkeleton<InputsFinalized>> {
        if self.inputs.is_empty() {
            return Err(Error::NoInputs);
        }
        Ok(TxSkeleton {
            cell_deps: self.cell_deps,
            inputs: self.inputs,
            outputs: self.outputs,
            outputs_data: self.outputs_data,
            fee: self.fee,
            _stage: PhantomData,
        })
    }
}

impl TxSkeleton<InputsFinalized> {
    pub fn first_input(&self) -> CellInput {
        // finalize_inputs guarantees at least one input
        CellInput::new(self.inputs[0].out_point.clone(), 0)
    }

    pub fn output(mut self, output: CellOutput, data: Bytes) -> Self {
        self.outputs.push(output);
        self.outputs_data.push(data);
        self
    }

    /// Deposits `data` in a code cell sized by the storage rule. The default
    /// lock has an all-zero code hash, so the cell can never be spent.
    pub fn code_output(self, params: &WorkflowParams, data: Bytes) -> Result<Self> {
        let capacity = params.code_cell_capacity(data.len())?;
        let output = CellOutput::new_builder()
            .lock(Script::default())
            .capacity(Capacity::shannons(capacity).pack())
            .build();
        Ok(self.output(output, data))
    }

    pub fn output_capacity(&self) -> Result<u64> {
        sum_capacity(self.outputs.iter().map(capacity_of))
    }

    /// Appends one trailing change output paid back to `change_lock`.
    pub fn balance(self, change_lock: Script) -> Result<BuiltTransaction> {
        let change = self.leftover(self.output_capacity()?)?;
        let change_output = CellOutput::new_builder()
            .lock(change_lock)
            .capacity(Capacity::shannons(change).pack())
            .build();
        warn_if_undersized(&change_output, 0);
        self.output(change_output, Bytes::new()).build()
    }

    /// Lets the output at `index` absorb whatever is left after the other
    /// outputs and the fee, instead of creating a change cell.
    pub fn balance_into(mut self, index: usize) -> Result<BuiltTransaction> {
        if index >= self.outputs.len() {
            return Err(Error::OutputIndexOutOfBounds(index));
        }
        let others = sum_capacity(
            self.outputs
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, o)| capacity_of(o)),
        )?;
        let capacity = self.leftover(others)?;
        let output = self.outputs[index]
            .clone()
            .as_builder()
            .capacity(Capacity::shannons(capacity).pack())
            .build();
        warn_if_undersized(&output, self.outputs_data[index].len());
        self.outputs[index] = output;
        self.build()
    }

    fn leftover(&self, spent: u64) -> Result<u64> {
        let available = self.input_capacity()?;
        let required = spent.checked_add(self.fee).ok_or(Error::CapacityOverflow)?;
        available
            .checked_sub(required)
            .ok_or(Error::NegativeChange {
                available,
                required,
            })
    }

    fn build(self) -> Result<BuiltTransaction> {
        let tx = TransactionBuilder::default()
            .cell_deps(self.cell_deps)
            .inputs(
                self.inputs
                    .iter()
                    .map(|cell| CellInput::new(cell.out_point.clone(), 0)),
            )
            .outputs(self.outputs)
            .outputs_data(
                self.outputs_data
                    .into_iter()
                    .map(|d| d.pack())
                    .collect::<Vec<packed::Bytes>>(),
            )
            .build();
        let built = BuiltTransaction {
            tx,
            inputs: self.inputs,
            fee: self.fee,
        };
        built.check_conservation()?;
        Ok(built)
    }
}

fn warn_if_undersized(output: &CellOutput, data_len: usize) {
    let occupied = Capacity::bytes(data_len)
        .and_then(|data| output.occupied_capacity(data))
        .map(|c| c.as_u64())
        .unwrap_or(u64::MAX);
    let capacity = capacity_of(output);
    if capacity < occupied {
        warn!(
            "output holds {} shannons but occupies {}, the ledger will refuse it",
            capacity, occupied
        );
    }
}

pub(crate) fn capacity_of(output: &CellOutput) -> u64 {
    output.capacity().unpack()
}

fn sum_capacity(mut capacities: impl Iterator<Item = u64>) -> Result<u64> {
    capacities.try_fold(0u64, |sum, c| sum.checked_add(c).ok_or(Error::CapacityOverflow))
}

/// An unsigned transaction plus the cells it spends, in input order.
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub tx: TransactionView,
    pub inputs: Vec<LiveCell>,
    pub fee: u64,
}

impl BuiltTransaction {
    pub fn input_capacity(&self) -> Result<u64> {
        sum_capacity(self.inputs.iter().map(LiveCell::capacity))
    }

    pub fn output_capacity(&self) -> Result<u64> {
        sum_capacity(self.tx.outputs().into_iter().map(|o| capacity_of(&o)))
    }

    pub fn check_conservation(&self) -> Result<()> {
        let available = self.input_capacity()?;
        let required = self
            .output_capacity()?
            .checked_add(self.fee)
            .ok_or(Error::CapacityOverflow)?;
        if available != required {
            return Err(Error::NegativeChange {
                available,
                required,
            });
        }
        Ok(())
    }
}
