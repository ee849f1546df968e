//! Proposal instruction composition.
//!
//! [`InstructionComposer`] decides which proposal instructions an approval
//! needs for a given status and in which order. Encoding of each instruction
//! is delegated to a [`ProposalInstructionBuilder`]; [`SquadsInstructions`]
//! is the Squads v4 binding.

use crate::pda::proposal_address;
use crate::proposal::ProposalStatus;
use sha2::{Digest, Sha256};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;
use std::fmt;
use std::sync::Arc;

/// Proposal instruction kinds the composer can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProposalInstructionKind {
    /// Create the proposal account
    Create,
    /// Move a draft proposal to active
    Activate,
    /// Cast an approval vote
    Approve,
}

impl ProposalInstructionKind {
    /// Program instruction name
    pub fn instruction_name(&self) -> &'static str {
        match self {
            ProposalInstructionKind::Create => "proposal_create",
            ProposalInstructionKind::Activate => "proposal_activate",
            ProposalInstructionKind::Approve => "proposal_approve",
        }
    }

    /// First 8 bytes of `sha256("global:<name>")`
    pub fn discriminator(&self) -> [u8; 8] {
        let digest = Sha256::digest(format!("global:{}", self.instruction_name()).as_bytes());
        let mut discriminator = [0u8; 8];
        discriminator.copy_from_slice(&digest[..8]);
        discriminator
    }

    /// Identify an instruction from its data
    pub fn from_data(data: &[u8]) -> Option<Self> {
        let prefix = data.get(..8)?;
        [
            ProposalInstructionKind::Create,
            ProposalInstructionKind::Activate,
            ProposalInstructionKind::Approve,
        ]
        .into_iter()
        .find(|kind| kind.discriminator() == prefix)
    }
}

impl fmt::Display for ProposalInstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.instruction_name())
    }
}

/// Parameters shared by every proposal instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposalInstructionArgs {
    /// Multisig account
    pub multisig: Pubkey,
    /// Acting member; also proposer and rent payer on create
    pub member: Pubkey,
    /// Transaction index the proposal belongs to
    pub transaction_index: u64,
    /// Multisig program id
    pub program_id: Pubkey,
}

/// Builds opaque proposal instructions for a multisig program
pub trait ProposalInstructionBuilder: Send + Sync {
    /// Create a non-draft proposal
    fn proposal_create(&self, args: &ProposalInstructionArgs) -> Instruction;

    /// Activate a draft proposal
    fn proposal_activate(&self, args: &ProposalInstructionArgs) -> Instruction;

    /// Approve a proposal
    fn proposal_approve(&self, args: &ProposalInstructionArgs) -> Instruction;
}

/// Squads v4 instruction encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct SquadsInstructions;

impl SquadsInstructions {
    fn data(kind: ProposalInstructionKind, args: &[u8]) -> Vec<u8> {
        let mut data = kind.discriminator().to_vec();
        data.extend_from_slice(args);
        data
    }
}

impl ProposalInstructionBuilder for SquadsInstructions {
    fn proposal_create(&self, args: &ProposalInstructionArgs) -> Instruction {
        let proposal = proposal_address(&args.multisig, args.transaction_index, &args.program_id);

        // ProposalCreateArgs { transaction_index: u64, draft: bool }
        let mut encoded = args.transaction_index.to_le_bytes().to_vec();
        encoded.push(0);

        Instruction::new_with_bytes(
            args.program_id,
            &Self::data(ProposalInstructionKind::Create, &encoded),
            vec![
                AccountMeta::new_readonly(args.multisig, false),
                AccountMeta::new(proposal, false),
                AccountMeta::new_readonly(args.member, true),
                AccountMeta::new(args.member, true),
                AccountMeta::new_readonly(system_program::ID, false),
            ],
        )
    }

    fn proposal_activate(&self, args: &ProposalInstructionArgs) -> Instruction {
        let proposal = proposal_address(&args.multisig, args.transaction_index, &args.program_id);

        Instruction::new_with_bytes(
            args.program_id,
            &Self::data(ProposalInstructionKind::Activate, &[]),
            vec![
                AccountMeta::new_readonly(args.multisig, false),
                AccountMeta::new(args.member, true),
                AccountMeta::new(proposal, false),
            ],
        )
    }

    fn proposal_approve(&self, args: &ProposalInstructionArgs) -> Instruction {
        let proposal = proposal_address(&args.multisig, args.transaction_index, &args.program_id);

        // ProposalVoteArgs { memo: None }
        Instruction::new_with_bytes(
            args.program_id,
            &Self::data(ProposalInstructionKind::Approve, &[0]),
            vec![
                AccountMeta::new_readonly(args.multisig, false),
                AccountMeta::new(args.member, true),
                AccountMeta::new(proposal, false),
            ],
        )
    }
}

/// Maps a proposal status to the ordered instructions of one approval
#[derive(Clone)]
pub struct InstructionComposer {
    builder: Arc<dyn ProposalInstructionBuilder>,
}

impl InstructionComposer {
    /// Create a composer over `builder`
    pub fn new(builder: Arc<dyn ProposalInstructionBuilder>) -> Self {
        Self { builder }
    }

    /// Composer using the Squads v4 encoding
    pub fn squads() -> Self {
        Self::new(Arc::new(SquadsInstructions))
    }

    /// Instruction kinds for `status`, in submission order.
    ///
    /// Create and activate come first because approve reads the proposal
    /// account they produce within the same transaction.
    pub fn plan(status: ProposalStatus) -> Vec<ProposalInstructionKind> {
        let mut kinds = Vec::with_capacity(2);
        match status {
            ProposalStatus::None => kinds.push(ProposalInstructionKind::Create),
            ProposalStatus::Draft => kinds.push(ProposalInstructionKind::Activate),
            _ => {}
        }
        kinds.push(ProposalInstructionKind::Approve);
        kinds
    }

    /// Build the instructions for `status`
    pub fn compose(
        &self,
        status: ProposalStatus,
        multisig: &Pubkey,
        actor: &Pubkey,
        transaction_index: u64,
        program_id: &Pubkey,
    ) -> Vec<Instruction> {
        let args = ProposalInstructionArgs {
            multisig: *multisig,
            member: *actor,
            transaction_index,
            program_id: *program_id,
        };

        Self::plan(status)
            .into_iter()
            .map(|kind| match kind {
                ProposalInstructionKind::Create => self.builder.proposal_create(&args),
                ProposalInstructionKind::Activate => self.builder.proposal_activate(&args),
                ProposalInstructionKind::Approve => self.builder.proposal_approve(&args),
            })
            .collect()
    }
}
