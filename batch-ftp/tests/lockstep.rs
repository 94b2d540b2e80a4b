//! Sender and reassembler driven against each other without sockets.
//!
//! Every batch the sender hands out is fed straight into the reassembler; the
//! single reply it produces must be exactly the ACK the sender expects.

use batch_ftp::{
    batch::BatchCycle,
    packet::{Ack, Datagram},
    receiver::{Reassembler, Step},
    sender::Sender,
    state::SessionState,
};

fn contents(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

/// Run one lossless transfer; returns the reconstructed file and the batch
/// sizes the sender used.
fn transfer(mut sender: Sender, mut receiver: Reassembler) -> (Vec<u8>, Vec<usize>) {
    let mut batches = Vec::new();

    while !sender.is_finished() {
        let mut replies: Vec<Ack> = Vec::new();
        let mut sent = 0;
        while let Some(unit) = sender.next_unit() {
            sent += 1;
            if let Step::Reply(ack) = receiver.on_datagram(&Datagram::Data(unit)).unwrap() {
                replies.push(ack);
            }
        }
        assert!(sender.awaiting_ack());
        assert_eq!(replies.len(), 1, "one ack per batch");
        batches.push(sent);
        assert_eq!(sender.on_ack(replies[0]).unwrap(), sent);
    }

    assert_eq!(receiver.state(), SessionState::Completed);
    (receiver.finish().unwrap(), batches)
}

/// Every cycle length and chunk size reconstructs the file with one matching ACK per batch.
#[test]
fn lossless_transfers_across_cycles_and_chunk_sizes() {
    for max_batch in 1..=4u8 {
        for chunk in [1u16, 7, 100] {
            for len in [0usize, 1, 99, 100, 101, 250, 1_234] {
                let data = contents(len);
                let sender = Sender::new(data.clone(), chunk, BatchCycle::new(max_batch)).unwrap();
                let receiver = Reassembler::new(chunk, BatchCycle::new(max_batch), usize::MAX);
                let (got, batches) = transfer(sender, receiver);
                assert_eq!(got, data, "len={len} chunk={chunk} max_batch={max_batch}");

                // Every batch but the last follows the cycle exactly.
                let mut cycle = BatchCycle::new(max_batch);
                for &size in &batches[..batches.len() - 1] {
                    assert_eq!(size, cycle.current());
                    cycle.advance();
                }
                assert!(batches[batches.len() - 1] <= cycle.current());
            }
        }
    }
}

/// A hello switches a default receiver to the sender's chunk size and cycle.
#[test]
fn hello_reconfigures_a_default_receiver() {
    let data = contents(777);
    let sender = Sender::new(data.clone(), 13, BatchCycle::new(6)).unwrap();
    let mut receiver = Reassembler::new(100, BatchCycle::default(), 1_024_000);

    let reply = receiver.on_datagram(&Datagram::Hello(sender.hello())).unwrap();
    assert!(matches!(reply, Step::Reply(ack) if ack.is_ok()));
    assert_eq!(receiver.chunk_size(), 13);

    let (got, _) = transfer(sender, receiver);
    assert_eq!(got, data);
}

/// Replaying an already delivered batch is dropped and leaves the write offset unchanged.
#[test]
fn full_batch_replay_is_harmless() {
    let data = contents(1_000);
    let mut sender = Sender::new(data.clone(), 100, BatchCycle::default()).unwrap();
    let mut receiver = Reassembler::new(100, BatchCycle::default(), usize::MAX);

    while !sender.is_finished() {
        let mut ack = None;
        while let Some(unit) = sender.next_unit() {
            if let Step::Reply(a) = receiver.on_datagram(&Datagram::Data(unit)).unwrap() {
                ack = Some(a);
            }
        }
        let offset = receiver.write_offset();
        let replay: Vec<_> = sender.in_flight().cloned().collect();
        for unit in replay {
            let step = receiver.on_datagram(&Datagram::Data(unit)).unwrap();
            assert_eq!(step, Step::Dropped);
        }
        assert_eq!(receiver.write_offset(), offset);
        sender.on_ack(ack.unwrap()).unwrap();
    }
    assert_eq!(receiver.finish().unwrap(), data);
}
