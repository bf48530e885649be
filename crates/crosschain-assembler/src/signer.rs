use crate::error::{Error, Result};
use ckb_hash::{blake2b_256, new_blake2b};
use ckb_sdk::{constants::SIGHASH_TYPE_HASH, SECP256K1};
use ckb_types::{
    bytes::Bytes,
    core::{ScriptHashType, TransactionView},
    packed::{self, Byte32, Script, WitnessArgs},
    prelude::*,
    H256,
};
use crosschain_traits::LiveCell;
use log::debug;

pub const SIGNATURE_SIZE: usize = 65;

/// Holds one raw secp256k1 key and the genesis sighash lock it controls.
pub struct SighashSigner {
    secret_key: secp256k1::SecretKey,
    lock: Script,
}

impl SighashSigner {
    pub fn from_private_key(private_key: &H256) -> Result<Self> {
        let secret_key = secp256k1::SecretKey::from_slice(private_key.as_bytes())
            .map_err(|e| Error::Signature(format!("invalid private key: {}", e)))?;
        let pubkey = secp256k1::PublicKey::from_secret_key(&SECP256K1, &secret_key);
        Ok(Self {
            secret_key,
            lock: build_sighash_lock(&pubkey),
        })
    }

    pub fn lock_script(&self) -> &Script {
        &self.lock
    }

    pub fn lock_hash(&self) -> Byte32 {
        self.lock.calc_script_hash()
    }

    /// 65 byte recoverable signature: 64 bytes compact form, then the
    /// recovery id.
    pub fn sign(&self, message: &[u8; 32]) -> Result<Bytes> {
        let message = secp256k1::Message::from_slice(message)
            .map_err(|e| Error::Signature(format!("invalid message: {}", e)))?;
        let signature = SECP256K1.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, data) = signature.serialize_compact();
        let mut signature_bytes = vec![0u8; SIGNATURE_SIZE];
        signature_bytes[0..64].copy_from_slice(&data[0..64]);
        signature_bytes[64] = recovery_id.to_i32() as u8;
        Ok(Bytes::from(signature_bytes))
    }
}

pub fn build_sighash_lock(pubkey: &secp256k1::PublicKey) -> Script {
    let hash160 = blake2b_256(&pubkey.serialize()[..])[0..20].to_vec();
    Script::new_builder()
        .code_hash(SIGHASH_TYPE_HASH.pack())
        .hash_type(ScriptHashType::Type.into())
        .args(Bytes::from(hash160).pack())
        .build()
}

/// Inputs sharing one lock script, signed together by a single witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningGroup {
    pub lock_hash: Byte32,
    pub input_indices: Vec<usize>,
}

/// Groups inputs by lock hash, ordered by each group's first input.
pub fn signing_groups(inputs: &[LiveCell]) -> Vec<SigningGroup> {
    let mut groups: Vec<SigningGroup> = Vec::new();
    for (i, cell) in inputs.iter().enumerate() {
        let lock_hash = cell.lock().calc_script_hash();
        match groups.iter_mut().find(|g| g.lock_hash == lock_hash) {
            Some(group) => group.input_indices.push(i),
            None => groups.push(SigningGroup {
                lock_hash,
                input_indices: vec![i],
            }),
        }
    }
    groups
}

pub fn placeholder_witness() -> WitnessArgs {
    WitnessArgs::new_builder()
        .lock(Some(Bytes::from(vec![0u8; SIGNATURE_SIZE])).pack())
        .build()
}

/// The sighash-all message: tx hash, then every witness of the group
/// (the first one carrying a zeroed signature), then witnesses that have
/// no matching input. Each witness is prefixed by its u64 LE length.
pub fn signing_message(
    tx_hash: &Byte32,
    group: &SigningGroup,
    first_witness: &WitnessArgs,
    witnesses: &[packed::Bytes],
    inputs_len: usize,
) -> [u8; 32] {
    let mut hasher = new_blake2b();
    hasher.update(tx_hash.as_slice());
    let first = first_witness.as_bytes();
    hasher.update(&(first.len() as u64).to_le_bytes());
    hasher.update(&first);
    let rest = group.input_indices.iter().skip(1).copied();
    for i in rest.chain(inputs_len..witnesses.len()) {
        let witness = witnesses[i].raw_data();
        hasher.update(&(witness.len() as u64).to_le_bytes());
        hasher.update(&witness);
    }
    let mut message = [0u8; 32];
    hasher.finalize(&mut message);
    message
}

/// Signs every group with the signer owning its lock. Witnesses of
/// non-leading inputs in a group are left empty.
pub fn sign_transaction(
    tx: &TransactionView,
    groups: &[SigningGroup],
    signers: &[&SighashSigner],
) -> Result<TransactionView> {
    let inputs_len = tx.inputs().len();
    let mut witnesses: Vec<packed::Bytes> = tx.witnesses().into_iter().collect();
    if witnesses.len() < inputs_len {
        witnesses.resize(inputs_len, Bytes::new().pack());
    }
    let tx_hash = tx.hash();

    for group in groups {
        let signer = signers
            .iter()
            .find(|signer| signer.lock_hash() == group.lock_hash)
            .ok_or_else(|| Error::Signature(format!("no key for lock {}", group.lock_hash)))?;
        let first = *group
            .input_indices
            .first()
            .ok_or_else(|| Error::Signature("empty signing group".to_string()))?;
        if let Some(&out_of_range) = group.input_indices.iter().find(|&&i| i >= inputs_len) {
            return Err(Error::Signature(format!(
                "signing group refers to missing input {}",
                out_of_range
            )));
        }
        for &i in group.input_indices.iter().skip(1) {
            witnesses[i] = Bytes::new().pack();
        }

        let placeholder = placeholder_witness();
        let message = signing_message(&tx_hash, group, &placeholder, &witnesses, inputs_len);
        let signature = signer.sign(&message)?;
        witnesses[first] = placeholder
            .as_builder()
            .lock(Some(signature).pack())
            .build()
            .as_bytes()
            .pack();
        debug!(
            "signed group {} covering inputs {:?}",
            group.lock_hash, group.input_indices
        );
    }

    Ok(tx.as_advanced_builder().set_witnesses(witnesses).build())
}
