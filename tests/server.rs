//! Server session behaviour, driven with raw PDUs over loopback TCP.

mod common;

use std::time::Duration;

use common::{raw_bind, raw_connect, read, TestServer, PASSWORD, SYSTEM_ID, USER, WAIT};
use smpp_session::config::{UnbindPolicy, UnknownCommandPolicy};
use smpp_session::message::{DataCoding, ShortMessage, Status, Tag};
use smpp_session::pdu::{CommandId, CommandStatus, Field, Pdu};

#[tokio::test]
async fn test_bind_returns_server_system_id() {
    let ts = TestServer::start().await;

    for command in [
        CommandId::BindTransmitter,
        CommandId::BindReceiver,
        CommandId::BindTransceiver,
    ] {
        let (_conn, resp) = raw_bind(ts.addr, command, USER, PASSWORD).await;
        assert_eq!(resp.command_id(), command.response());
        assert_eq!(resp.status(), CommandStatus::OK);
        assert_eq!(resp.sequence(), 1);
        assert_eq!(resp.field_str(Field::SystemId), Some(SYSTEM_ID));
    }
}

#[tokio::test]
async fn test_bad_credentials_close_without_response() {
    let ts = TestServer::start().await;

    for (user, password) in [(USER, "wrong"), ("nobody", PASSWORD)] {
        let conn = raw_connect(ts.addr).await;
        conn.write(Pdu::bind(CommandId::BindTransmitter, 1, user, password))
            .await
            .unwrap();

        let err = read(&conn).await.unwrap_err();
        assert!(err.is_closed(), "expected close, got {err}");
    }

    let stats = ts.server.stats();
    assert_eq!(stats.binds_failed, 2);
    assert_eq!(stats.binds_ok, 0);
}

#[tokio::test]
async fn test_first_pdu_must_be_bind() {
    let ts = TestServer::start().await;

    let conn = raw_connect(ts.addr).await;
    conn.write(Pdu::enquire_link(1)).await.unwrap();

    let err = read(&conn).await.unwrap_err();
    assert!(err.is_closed());
}

#[tokio::test]
async fn test_empty_system_id_is_malformed() {
    let ts = TestServer::start().await;

    let conn = raw_connect(ts.addr).await;
    conn.write(Pdu::bind(CommandId::BindTransmitter, 1, "", PASSWORD))
        .await
        .unwrap();

    assert!(read(&conn).await.unwrap_err().is_closed());
}

#[tokio::test]
async fn test_bind_timeout_closes_idle_connection() {
    let ts = TestServer::with_config(|c| c.with_bind_timeout(Duration::from_millis(100))).await;

    let conn = raw_connect(ts.addr).await;
    assert!(read(&conn).await.unwrap_err().is_closed());
}

#[tokio::test]
async fn test_enquire_link_echoes_sequence() {
    let ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    conn.write(Pdu::enquire_link(7)).await.unwrap();
    let resp = read(&conn).await.unwrap();

    assert_eq!(resp.command_id(), CommandId::EnquireLinkResp);
    assert_eq!(resp.sequence(), 7);
    assert_eq!(resp.status(), CommandStatus::OK);
}

#[tokio::test]
async fn test_submit_passes_handler_result_through() {
    let mut ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    let message = ShortMessage::new("467019191695", "467373737373", "Hello world");
    conn.write(message.to_submit_pdu(2)).await.unwrap();
    let resp = read(&conn).await.unwrap();

    assert_eq!(resp.command_id(), CommandId::SubmitSmResp);
    assert_eq!(resp.sequence(), 2);
    assert_eq!(resp.status(), CommandStatus::OK);
    assert_eq!(resp.field_str(Field::MessageId), Some("1234"));

    let received = ts.received.recv().await.unwrap();
    assert_eq!(received, message);
}

#[tokio::test]
async fn test_submit_payload_reconstructed() {
    let mut ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransceiver, USER, PASSWORD).await;

    let ucs2 = ShortMessage::new("a", "b", "Привет").with_data_coding(DataCoding::Ucs2);
    conn.write(ucs2.to_submit_pdu(2)).await.unwrap();
    read(&conn).await.unwrap();

    let received = ts.received.recv().await.unwrap();
    assert_eq!(received.text_str(), "Привет");
    assert_eq!(received.data_coding, DataCoding::Ucs2);

    let long = ShortMessage::new("a", "b", "y".repeat(400)).with_tlv(Tag::UserMessageReference, vec![0, 9]);
    conn.write(long.to_submit_pdu(3)).await.unwrap();
    read(&conn).await.unwrap();

    let received = ts.received.recv().await.unwrap();
    assert_eq!(received.text.len(), 400);
    assert_eq!(
        received.tlv_fields.get(&Tag::UserMessageReference).map(|v| v.as_ref()),
        Some(&[0u8, 9][..])
    );
}

#[tokio::test]
async fn test_handler_error_maps_to_unknown_error() {
    let ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    conn.write(ShortMessage::new("a", "fail", "x").to_submit_pdu(5))
        .await
        .unwrap();
    let resp = read(&conn).await.unwrap();

    assert_eq!(resp.sequence(), 5);
    assert_eq!(resp.status(), CommandStatus::UNKNOWN_ERROR);
    assert_eq!(resp.field_str(Field::MessageId), None);

    // The session survives a failed submission.
    conn.write(Pdu::enquire_link(6)).await.unwrap();
    assert_eq!(read(&conn).await.unwrap().sequence(), 6);

    assert_eq!(ts.server.stats().submits_failed, 1);
}

#[tokio::test]
async fn test_handler_timeout_maps_to_unknown_error() {
    let ts = TestServer::with_config(|c| c.with_handler_timeout(Duration::from_millis(100))).await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    conn.write(ShortMessage::new("a", "slow", "x").to_submit_pdu(2))
        .await
        .unwrap();
    let resp = read(&conn).await.unwrap();

    assert_eq!(resp.status(), CommandStatus::UNKNOWN_ERROR);
}

#[tokio::test]
async fn test_handler_status_without_message_id() {
    let ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    conn.write(ShortMessage::new("a", "queue", "x").to_submit_pdu(2))
        .await
        .unwrap();
    let resp = read(&conn).await.unwrap();

    assert_eq!(resp.status(), CommandStatus::from(Status::MessageQueueFull));
    assert_eq!(resp.field_str(Field::MessageId), None);
}

#[tokio::test]
async fn test_receiver_cannot_submit() {
    let ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindReceiver, USER, PASSWORD).await;

    conn.write(ShortMessage::new("a", "b", "x").to_submit_pdu(2))
        .await
        .unwrap();
    let resp = read(&conn).await.unwrap();

    assert_eq!(resp.command_id(), CommandId::SubmitSmResp);
    assert_eq!(resp.status(), CommandStatus::INVALID_BIND_STATUS);
}

#[tokio::test]
async fn test_second_bind_already_bound() {
    let ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    conn.write(Pdu::bind(CommandId::BindTransceiver, 2, USER, PASSWORD))
        .await
        .unwrap();
    let resp = read(&conn).await.unwrap();

    assert_eq!(resp.command_id(), CommandId::BindTransceiverResp);
    assert_eq!(resp.status(), CommandStatus::ALREADY_BOUND);
}

#[tokio::test]
async fn test_unbind_closes_session_by_default() {
    let ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    conn.write(Pdu::unbind(3)).await.unwrap();
    let resp = read(&conn).await.unwrap();
    assert_eq!(resp.command_id(), CommandId::UnbindResp);
    assert_eq!(resp.sequence(), 3);

    assert!(read(&conn).await.unwrap_err().is_closed());
}

#[tokio::test]
async fn test_unbind_stay_bound_policy() {
    let ts = TestServer::with_config(|c| c.with_unbind_policy(UnbindPolicy::StayBound)).await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    conn.write(Pdu::unbind(3)).await.unwrap();
    assert_eq!(read(&conn).await.unwrap().command_id(), CommandId::UnbindResp);

    conn.write(Pdu::enquire_link(4)).await.unwrap();
    let resp = read(&conn).await.unwrap();
    assert_eq!(resp.command_id(), CommandId::EnquireLinkResp);
    assert_eq!(resp.sequence(), 4);
}

#[tokio::test]
async fn test_unknown_command_ignored_by_default() {
    let ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    // query_sm is outside the supported set
    conn.write(Pdu::new(CommandId::from(0x0000_0003), 2)).await.unwrap();
    conn.write(Pdu::enquire_link(3)).await.unwrap();

    let resp = read(&conn).await.unwrap();
    assert_eq!(resp.command_id(), CommandId::EnquireLinkResp);
    assert_eq!(resp.sequence(), 3);
}

#[tokio::test]
async fn test_unknown_command_generic_nack_policy() {
    let ts = TestServer::with_config(|c| {
        c.with_unknown_command_policy(UnknownCommandPolicy::GenericNack)
    })
    .await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    conn.write(Pdu::new(CommandId::from(0x0000_0003), 2)).await.unwrap();
    let resp = read(&conn).await.unwrap();

    assert_eq!(resp.command_id(), CommandId::GenericNack);
    assert_eq!(resp.sequence(), 2);
    assert_eq!(resp.status(), CommandStatus::INVALID_COMMAND_ID);
}

#[tokio::test]
async fn test_responses_from_peer_are_ignored() {
    let ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    conn.write(Pdu::enquire_link(9).response(CommandStatus::OK)).await.unwrap();
    conn.write(Pdu::enquire_link(10)).await.unwrap();

    assert_eq!(read(&conn).await.unwrap().sequence(), 10);
}

#[tokio::test]
async fn test_close_keeps_accepted_sessions() {
    let ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    ts.server.close().await.unwrap();
    assert!(ts.server.addr().is_none());

    conn.write(Pdu::enquire_link(2)).await.unwrap();
    assert_eq!(read(&conn).await.unwrap().command_id(), CommandId::EnquireLinkResp);

    assert!(tokio::net::TcpStream::connect(ts.addr).await.is_err());
}

#[tokio::test]
async fn test_connection_bookkeeping() {
    let ts = TestServer::start().await;
    let (conn, _) = raw_bind(ts.addr, CommandId::BindTransmitter, USER, PASSWORD).await;

    assert_eq!(ts.server.active_connections(), 1);
    let connections = ts.server.connections().await;
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].system_id().await.as_deref(), Some(USER));

    conn.close().await;
    tokio::time::timeout(WAIT, async {
        while ts.server.active_connections() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection not released");

    let stats = ts.server.stats();
    assert_eq!(stats.connections_accepted, 1);
    assert_eq!(stats.binds_ok, 1);
}
