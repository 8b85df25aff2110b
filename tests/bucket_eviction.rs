#[path = "common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{Registry, TestNode, TEST_NETWORK};
use kaddns::{Contact, NodeId, RpcHeader, BUCKET_SIZE};

/// Contacts sharing bucket 0 relative to an all-zero node id.
fn same_bucket_contact(i: u8) -> Contact {
    Contact::new(
        NodeId::from_bytes(&[0x80, i]),
        format!("unreachable-{i}"),
    )
}

fn header_for(contact: &Contact) -> RpcHeader {
    RpcHeader {
        sender: contact.clone(),
        network_id: TEST_NETWORK.to_owned(),
    }
}

#[tokio::test]
async fn dead_incumbents_are_evicted_for_newcomers() {
    let registry = Arc::new(Registry::default());
    let main = TestNode::new(&registry, NodeId::from_bytes(&[])).await;

    // BUCKET_SIZE + 1 distinct senders hashing into the same bucket, none
    // of them reachable, so every liveness probe fails.
    for i in 0..=BUCKET_SIZE as u8 {
        main.node
            .handle_ping(&header_for(&same_bucket_contact(i)))
            .await
            .unwrap();
    }

    // The oldest entry was probed and lost its slot to the newest.
    let probes = main.transport.ping_calls().await;
    assert_eq!(probes, vec![same_bucket_contact(0).id]);

    let observer = TestNode::new(&registry, NodeId::from_bytes(&[0x01])).await;
    let contacts = main
        .node
        .handle_find_node(&observer.header(), NodeId::from_bytes(&[0x80]))
        .await
        .unwrap();

    assert_eq!(contacts.len(), BUCKET_SIZE);
    assert!(!contacts
        .iter()
        .any(|c| c.id == same_bucket_contact(0).id));
    assert!(contacts
        .iter()
        .any(|c| c.id == same_bucket_contact(BUCKET_SIZE as u8).id));
}

#[tokio::test]
async fn live_incumbent_survives_and_newcomer_is_discarded() {
    let registry = Arc::new(Registry::default());
    let main = TestNode::new(&registry, NodeId::from_bytes(&[])).await;

    // The eventual incumbent is registered, so its probe will succeed.
    let incumbent = TestNode::new(&registry, NodeId::from_bytes(&[0x80, 0])).await;
    main.node
        .handle_ping(&header_for(&incumbent.contact()))
        .await
        .unwrap();
    for i in 1..BUCKET_SIZE as u8 {
        main.node
            .handle_ping(&header_for(&same_bucket_contact(i)))
            .await
            .unwrap();
    }

    let newcomer = same_bucket_contact(0xEE);
    main.node.handle_ping(&header_for(&newcomer)).await.unwrap();

    let observer = TestNode::new(&registry, NodeId::from_bytes(&[0x01])).await;
    let contacts = main
        .node
        .handle_find_node(&observer.header(), NodeId::from_bytes(&[0x80]))
        .await
        .unwrap();

    assert!(contacts.iter().any(|c| c.id == incumbent.contact().id));
    assert!(!contacts.iter().any(|c| c.id == newcomer.id));
}

#[tokio::test]
async fn repeated_pings_do_not_duplicate_a_sender() {
    let registry = Arc::new(Registry::default());
    let main = TestNode::new(&registry, NodeId::from_bytes(&[])).await;

    let sender = same_bucket_contact(7);
    for _ in 0..3 {
        main.node.handle_ping(&header_for(&sender)).await.unwrap();
    }

    assert_eq!(main.node.known_peers().await, 1);

    let observer = TestNode::new(&registry, NodeId::from_bytes(&[0x01])).await;
    let contacts = main
        .node
        .handle_find_node(&observer.header(), sender.id)
        .await
        .unwrap();
    let matches = contacts.iter().filter(|c| c.id == sender.id).count();
    assert_eq!(matches, 1);
}

#[tokio::test]
async fn mismatched_network_id_is_rejected_without_table_update() {
    let registry = Arc::new(Registry::default());
    let main = TestNode::new(&registry, NodeId::from_bytes(&[])).await;

    let stranger = same_bucket_contact(1);
    let header = RpcHeader {
        sender: stranger.clone(),
        network_id: "some-other-overlay".to_owned(),
    };

    assert!(main.node.handle_ping(&header).await.is_err());
    assert!(main
        .node
        .handle_find_node(&header, stranger.id)
        .await
        .is_err());
    assert_eq!(main.node.known_peers().await, 0);
}
