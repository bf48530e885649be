use super::mock::{live_cell, signer};
use crate::builder::TxSkeleton;
use crate::error::Error;
use crate::signer::{
    build_sighash_lock, placeholder_witness, sign_transaction, signing_groups, signing_message,
    SighashSigner, SIGNATURE_SIZE,
};
use ckb_sdk::{
    traits::SecpCkbRawKeySigner,
    unlock::{ScriptSigner, SecpSighashScriptSigner},
    ScriptGroup, ScriptGroupType, SECP256K1,
};
use ckb_types::{
    bytes::Bytes,
    core::TransactionView,
    packed::{self, Script, WitnessArgs},
    prelude::*,
    H256,
};
use crosschain_traits::LiveCell;
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message,
};

fn recover_lock(signature: &[u8], message: &[u8; 32]) -> Script {
    let recovery_id = RecoveryId::from_i32(signature[64] as i32).unwrap();
    let signature = RecoverableSignature::from_compact(&signature[0..64], recovery_id).unwrap();
    let pubkey = SECP256K1
        .recover_ecdsa(&Message::from_slice(message).unwrap(), &signature)
        .unwrap();
    build_sighash_lock(&pubkey)
}

fn witness_signature(witness: &packed::Bytes) -> Bytes {
    WitnessArgs::from_slice(&witness.raw_data())
        .unwrap()
        .lock()
        .to_opt()
        .unwrap()
        .raw_data()
}

fn unsigned(inputs: Vec<LiveCell>, change_lock: &Script) -> (TransactionView, Vec<LiveCell>) {
    let built = TxSkeleton::new(1000)
        .inputs(inputs)
        .finalize_inputs()
        .unwrap()
        .balance(change_lock.clone())
        .unwrap();
    (built.tx, built.inputs)
}

#[test]
fn test_signing_groups_follow_first_appearance() {
    let admin = signer(1);
    let holder = signer(2);
    let inputs = vec![
        live_cell(admin.lock_script(), 100, 0),
        live_cell(holder.lock_script(), 100, 1),
        live_cell(admin.lock_script(), 100, 2),
        live_cell(admin.lock_script(), 100, 3),
    ];

    let groups = signing_groups(&inputs);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].lock_hash, admin.lock_hash());
    assert_eq!(groups[0].input_indices, vec![0, 2, 3]);
    assert_eq!(groups[1].lock_hash, holder.lock_hash());
    assert_eq!(groups[1].input_indices, vec![1]);
}

#[test]
fn test_sign_transaction_recovers_owner() {
    let admin = signer(1);
    let holder = signer(2);
    let (tx, inputs) = unsigned(
        vec![
            live_cell(admin.lock_script(), 50_000, 0),
            live_cell(holder.lock_script(), 50_000, 1),
            live_cell(admin.lock_script(), 50_000, 2),
        ],
        admin.lock_script(),
    );
    let groups = signing_groups(&inputs);

    let signed = sign_transaction(&tx, &groups, &[&holder, &admin]).unwrap();
    assert_eq!(signed.hash(), tx.hash());

    let witnesses: Vec<packed::Bytes> = signed.witnesses().into_iter().collect();
    assert_eq!(witnesses.len(), 3);
    assert!(witnesses[2].raw_data().is_empty());

    for (group, owner) in groups.iter().zip([&admin, &holder]) {
        let first = group.input_indices[0];
        let signature = witness_signature(&witnesses[first]);
        assert_eq!(signature.len(), SIGNATURE_SIZE);
        let message = signing_message(
            &signed.hash(),
            group,
            &placeholder_witness(),
            &witnesses,
            inputs.len(),
        );
        assert_eq!(&recover_lock(&signature, &message), owner.lock_script());
    }
}

#[test]
fn test_sign_transaction_without_key() {
    let admin = signer(1);
    let holder = signer(2);
    let (tx, inputs) = unsigned(
        vec![
            live_cell(admin.lock_script(), 50_000, 0),
            live_cell(holder.lock_script(), 50_000, 1),
        ],
        admin.lock_script(),
    );

    let result = sign_transaction(&tx, &signing_groups(&inputs), &[&admin]);
    assert!(matches!(result, Err(Error::Signature(_))));
}

#[test]
fn test_invalid_private_key() {
    let zero = SighashSigner::from_private_key(&H256::default());
    assert!(matches!(zero.err(), Some(Error::Signature(_))));

    let above_order = SighashSigner::from_private_key(&H256::from([0xffu8; 32]));
    assert!(matches!(above_order.err(), Some(Error::Signature(_))));
}

#[test]
fn test_signatures_are_deterministic() {
    let admin = signer(1);
    let message = [0x42u8; 32];
    let first = admin.sign(&message).unwrap();
    let second = admin.sign(&message).unwrap();

    assert_eq!(first, second);
    assert_eq!(&recover_lock(&first, &message), admin.lock_script());
}

#[test]
fn test_witnesses_match_sdk_signer() {
    let admin = signer(1);
    let holder = signer(2);
    let (tx, inputs) = unsigned(
        vec![
            live_cell(admin.lock_script(), 50_000, 0),
            live_cell(holder.lock_script(), 50_000, 1),
            live_cell(admin.lock_script(), 50_000, 2),
        ],
        admin.lock_script(),
    );
    let groups = signing_groups(&inputs);
    let ours = sign_transaction(&tx, &groups, &[&admin, &holder]).unwrap();

    // The sdk signer reads witnesses by input index, so they must exist
    let mut theirs = tx
        .as_advanced_builder()
        .set_witnesses(vec![Bytes::new().pack(); inputs.len()])
        .build();
    for (group, key) in groups.iter().zip([[1u8; 32], [2u8; 32]]) {
        let secret_key = secp256k1::SecretKey::from_slice(&key).unwrap();
        let sdk_signer = SecpSighashScriptSigner::new(Box::new(
            SecpCkbRawKeySigner::new_with_secret_keys(vec![secret_key]),
        ));
        let script_group = ScriptGroup {
            script: inputs[group.input_indices[0]].lock(),
            group_type: ScriptGroupType::Lock,
            input_indices: group.input_indices.clone(),
            output_indices: vec![],
        };
        theirs = sdk_signer.sign_tx(&theirs, &script_group).unwrap();
    }

    let ours: Vec<Bytes> = ours.witnesses().into_iter().map(|w| w.raw_data()).collect();
    let theirs: Vec<Bytes> = theirs
        .witnesses()
        .into_iter()
        .map(|w| w.raw_data())
        .collect();
    assert_eq!(ours, theirs);
}
