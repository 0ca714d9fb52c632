use std::sync::Arc;
use std::time::Duration;
use teleconsult_core::{
    CallOffer, ClientEvent, IceCandidate, ParticipantId, RoomId, ServerEvent, SessionDescription,
};
use tokio::sync::{Notify, mpsc};

use teleconsult_client::{
    CallConfig, CallHandle, CallNotification, CallSession, CallState, MediaKind, PeerEvent,
    RemoteTrack,
};

use crate::utils::{
    MediaBehavior, MockMedia, MockPeerFactory, MockSignalChannel, assert_nothing_emitted,
    init_tracing, recv_emitted,
};

fn start_session(
    identity: &str,
    media: Arc<MockMedia>,
    config: CallConfig,
) -> (
    CallHandle,
    mpsc::UnboundedReceiver<ClientEvent>,
    Arc<MockPeerFactory>,
) {
    let (channel, emitted_rx) = MockSignalChannel::new();
    let factory = Arc::new(MockPeerFactory::default());

    let (session, handle) = CallSession::new(
        RoomId::from("r1"),
        ParticipantId::from(identity),
        channel,
        factory.clone(),
        media,
        config,
    );
    tokio::spawn(session.run());

    (handle, emitted_rx, factory)
}

fn incoming_offer() -> CallOffer {
    CallOffer {
        room: RoomId::from("r1"),
        signal_data: SessionDescription::offer("v=0 remote-offer"),
        from: ParticipantId::from("doc1"),
    }
}

#[tokio::test]
async fn caller_joins_room_then_sends_offer() {
    init_tracing();
    let media = MockMedia::new(MediaBehavior::Grant);
    let (handle, mut emitted, _factory) = start_session("doc1", media, CallConfig::default());

    assert_eq!(
        recv_emitted(&mut emitted).await,
        ClientEvent::JoinRoom(RoomId::from("r1"))
    );

    handle
        .actions
        .send(teleconsult_client::UserAction::StartCall)
        .await
        .unwrap();

    let ClientEvent::CallUser(offer) = recv_emitted(&mut emitted).await else {
        panic!("expected call-user");
    };
    assert_eq!(offer.room, RoomId::from("r1"));
    assert_eq!(offer.from, ParticipantId::from("doc1"));
    assert_eq!(offer.signal_data.sdp, "v=0 mock-offer");
}

#[tokio::test]
async fn candidates_before_answer_flush_in_order() {
    init_tracing();
    let media = MockMedia::new(MediaBehavior::Grant);
    let (mut handle, mut emitted, factory) = start_session("doc1", media, CallConfig::default());

    let _ = recv_emitted(&mut emitted).await; // join-room
    handle
        .actions
        .send(teleconsult_client::UserAction::StartCall)
        .await
        .unwrap();
    let _ = recv_emitted(&mut emitted).await; // call-user

    // Candidates beat the answer through the relay.
    for label in ["c1", "c2", "c3"] {
        handle
            .server_events
            .send(ServerEvent::IceCandidate {
                room: RoomId::from("r1"),
                candidate: IceCandidate::new(label),
            })
            .await
            .unwrap();
    }

    handle
        .server_events
        .send(ServerEvent::AnswerMade {
            room: RoomId::from("r1"),
            signal_data: SessionDescription::answer("v=0 remote-answer"),
        })
        .await
        .unwrap();

    handle
        .state
        .wait_for(|s| *s == CallState::InCall)
        .await
        .unwrap();

    let peer = factory.peer(0);
    assert_eq!(
        peer.remote_sdp.lock().unwrap().as_ref().map(|d| d.sdp.clone()),
        Some("v=0 remote-answer".to_string())
    );
    assert_eq!(
        *peer.applied_candidates.lock().unwrap(),
        vec!["c1", "c2", "c3"]
    );
}

#[tokio::test]
async fn remote_decline_tears_down_and_notifies() {
    init_tracing();
    let media = MockMedia::new(MediaBehavior::Grant);
    let (mut handle, mut emitted, factory) =
        start_session("doc1", media.clone(), CallConfig::default());

    let _ = recv_emitted(&mut emitted).await;
    handle
        .actions
        .send(teleconsult_client::UserAction::StartCall)
        .await
        .unwrap();
    let _ = recv_emitted(&mut emitted).await; // call-user

    handle
        .server_events
        .send(ServerEvent::CallDeclined {
            from: ParticipantId::from("pat1"),
        })
        .await
        .unwrap();

    handle
        .state
        .wait_for(|s| *s == CallState::Declined)
        .await
        .unwrap();

    let notification = handle.notifications.recv().await.unwrap();
    assert!(matches!(
        notification,
        CallNotification::Declined { ref by } if *by == ParticipantId::from("pat1")
    ));

    assert!(factory.peer(0).closed.load(std::sync::atomic::Ordering::SeqCst));
    assert!(media.stopped.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn remote_end_is_authoritative_while_still_ringing() {
    init_tracing();
    let media = MockMedia::new(MediaBehavior::Grant);
    let (mut handle, mut emitted, _factory) = start_session("doc1", media, CallConfig::default());

    let _ = recv_emitted(&mut emitted).await;
    handle
        .actions
        .send(teleconsult_client::UserAction::StartCall)
        .await
        .unwrap();
    let _ = recv_emitted(&mut emitted).await;

    handle
        .server_events
        .send(ServerEvent::CallEnded {
            from: ParticipantId::from("pat1"),
        })
        .await
        .unwrap();

    handle
        .state
        .wait_for(|s| *s == CallState::Ended)
        .await
        .unwrap();
}

#[tokio::test]
async fn terminal_state_absorbs_late_signaling() {
    init_tracing();
    let media = MockMedia::new(MediaBehavior::Grant);
    let (mut handle, mut emitted, _factory) = start_session("doc1", media, CallConfig::default());

    let _ = recv_emitted(&mut emitted).await;
    handle
        .actions
        .send(teleconsult_client::UserAction::StartCall)
        .await
        .unwrap();
    let _ = recv_emitted(&mut emitted).await;

    handle
        .server_events
        .send(ServerEvent::CallEnded {
            from: ParticipantId::from("pat1"),
        })
        .await
        .unwrap();
    handle
        .state
        .wait_for(|s| *s == CallState::Ended)
        .await
        .unwrap();

    // Cross-sender ordering is not guaranteed: a stale answer and a stale
    // candidate may trail the call-ended. Neither may move the state.
    handle
        .server_events
        .send(ServerEvent::AnswerMade {
            room: RoomId::from("r1"),
            signal_data: SessionDescription::answer("v=0 stale"),
        })
        .await
        .unwrap();
    handle
        .server_events
        .send(ServerEvent::IceCandidate {
            room: RoomId::from("r1"),
            candidate: IceCandidate::new("stale"),
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*handle.state.borrow(), CallState::Ended);
}

#[tokio::test]
async fn media_granted_after_hangup_is_released_unused() {
    init_tracing();
    let gate = Arc::new(Notify::new());
    let media = MockMedia::new(MediaBehavior::Gated(gate.clone()));
    let (mut handle, mut emitted, factory) =
        start_session("doc1", media.clone(), CallConfig::default());

    let _ = recv_emitted(&mut emitted).await; // join-room
    handle
        .actions
        .send(teleconsult_client::UserAction::StartCall)
        .await
        .unwrap();

    // The permission prompt is still up; the user cancels.
    handle
        .actions
        .send(teleconsult_client::UserAction::HangUp)
        .await
        .unwrap();
    assert_eq!(
        recv_emitted(&mut emitted).await,
        ClientEvent::EndCall {
            room: RoomId::from("r1")
        }
    );
    handle
        .state
        .wait_for(|s| *s == CallState::Ended)
        .await
        .unwrap();

    // The grant finally lands. It must be released, not acted on.
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(media.stopped.load(std::sync::atomic::Ordering::SeqCst));
    assert!(factory.created.lock().unwrap().is_empty());
    assert_nothing_emitted(&mut emitted).await;
}

#[tokio::test]
async fn callee_accepts_and_answers_with_buffered_candidates() {
    init_tracing();
    let media = MockMedia::new(MediaBehavior::Grant);
    let (mut handle, mut emitted, factory) = start_session("pat1", media, CallConfig::default());

    let _ = recv_emitted(&mut emitted).await; // join-room

    handle
        .server_events
        .send(ServerEvent::CallMade(incoming_offer()))
        .await
        .unwrap();

    let notification = handle.notifications.recv().await.unwrap();
    assert!(matches!(notification, CallNotification::IncomingCall(_)));
    assert_eq!(*handle.state.borrow(), CallState::Idle);

    // Caller candidates arrive before the callee picks up.
    for label in ["c1", "c2"] {
        handle
            .server_events
            .send(ServerEvent::IceCandidate {
                room: RoomId::from("r1"),
                candidate: IceCandidate::new(label),
            })
            .await
            .unwrap();
    }

    handle
        .actions
        .send(teleconsult_client::UserAction::AcceptCall)
        .await
        .unwrap();

    let ClientEvent::MakeAnswer { room, signal_data } = recv_emitted(&mut emitted).await else {
        panic!("expected make-answer");
    };
    assert_eq!(room, RoomId::from("r1"));
    assert_eq!(signal_data.sdp, "v=0 mock-answer");

    handle
        .state
        .wait_for(|s| *s == CallState::InCall)
        .await
        .unwrap();

    let peer = factory.peer(0);
    assert_eq!(
        peer.remote_sdp.lock().unwrap().as_ref().map(|d| d.sdp.clone()),
        Some("v=0 remote-offer".to_string())
    );
    assert_eq!(*peer.applied_candidates.lock().unwrap(), vec!["c1", "c2"]);
}

#[tokio::test]
async fn callee_decline_emits_reject_and_stays_idle() {
    init_tracing();
    let media = MockMedia::new(MediaBehavior::Grant);
    let (mut handle, mut emitted, _factory) = start_session("pat1", media, CallConfig::default());

    let _ = recv_emitted(&mut emitted).await;

    handle
        .server_events
        .send(ServerEvent::CallMade(incoming_offer()))
        .await
        .unwrap();

    // Wait until the offer has been processed before declining, mirroring the
    // real UI flow where the decline button only exists once the call rings.
    let notification = handle.notifications.recv().await.unwrap();
    assert!(matches!(notification, CallNotification::IncomingCall(_)));

    handle
        .actions
        .send(teleconsult_client::UserAction::DeclineCall)
        .await
        .unwrap();

    assert_eq!(
        recv_emitted(&mut emitted).await,
        ClientEvent::RejectCall {
            room: RoomId::from("r1")
        }
    );
    assert_eq!(*handle.state.borrow(), CallState::Idle);
}

#[tokio::test]
async fn media_denial_returns_to_idle_with_user_facing_error() {
    init_tracing();
    let media = MockMedia::new(MediaBehavior::Deny);
    let (mut handle, mut emitted, _factory) = start_session("doc1", media, CallConfig::default());

    let _ = recv_emitted(&mut emitted).await;
    handle
        .actions
        .send(teleconsult_client::UserAction::StartCall)
        .await
        .unwrap();

    let notification = handle.notifications.recv().await.unwrap();
    assert!(matches!(notification, CallNotification::SetupFailed { .. }));
    handle
        .state
        .wait_for(|s| *s == CallState::Idle)
        .await
        .unwrap();

    // Nothing ever reaches the relay or the remote peer about this.
    assert_nothing_emitted(&mut emitted).await;
}

#[tokio::test(start_paused = true)]
async fn unanswered_call_times_out_and_hangs_up() {
    init_tracing();
    let media = MockMedia::new(MediaBehavior::Grant);
    let config = CallConfig {
        ring_timeout: Some(Duration::from_secs(5)),
    };
    let (mut handle, mut emitted, _factory) = start_session("doc1", media, config);

    let _ = recv_emitted(&mut emitted).await; // join-room
    handle
        .actions
        .send(teleconsult_client::UserAction::StartCall)
        .await
        .unwrap();
    let _ = recv_emitted(&mut emitted).await; // call-user

    handle
        .state
        .wait_for(|s| *s == CallState::Ended)
        .await
        .unwrap();
    assert_eq!(
        recv_emitted(&mut emitted).await,
        ClientEvent::EndCall {
            room: RoomId::from("r1")
        }
    );
}

#[tokio::test]
async fn gathered_candidates_are_relayed_until_the_call_settles() {
    init_tracing();
    let media = MockMedia::new(MediaBehavior::Grant);
    let (mut handle, mut emitted, factory) = start_session("doc1", media, CallConfig::default());

    let _ = recv_emitted(&mut emitted).await; // join-room
    handle
        .actions
        .send(teleconsult_client::UserAction::StartCall)
        .await
        .unwrap();
    let _ = recv_emitted(&mut emitted).await; // call-user

    handle
        .server_events
        .send(ServerEvent::AnswerMade {
            room: RoomId::from("r1"),
            signal_data: SessionDescription::answer("v=0 remote-answer"),
        })
        .await
        .unwrap();
    handle
        .state
        .wait_for(|s| *s == CallState::InCall)
        .await
        .unwrap();

    // The connection gathers a local candidate mid-call.
    let peer_events = factory.peer_events(0);
    peer_events
        .send(PeerEvent::CandidateGenerated(IceCandidate::new("local-1")))
        .await
        .unwrap();

    let ClientEvent::IceCandidate { room, candidate } = recv_emitted(&mut emitted).await else {
        panic!("expected ice-candidate");
    };
    assert_eq!(room, RoomId::from("r1"));
    assert_eq!(candidate.candidate, "local-1");

    handle
        .server_events
        .send(ServerEvent::CallEnded {
            from: ParticipantId::from("pat1"),
        })
        .await
        .unwrap();
    handle
        .state
        .wait_for(|s| *s == CallState::Ended)
        .await
        .unwrap();

    // A straggler from the (now closed) connection must not leak out.
    peer_events
        .send(PeerEvent::CandidateGenerated(IceCandidate::new("local-late")))
        .await
        .unwrap();
    assert_nothing_emitted(&mut emitted).await;
}

#[tokio::test]
async fn remote_track_is_surfaced_only_while_in_call() {
    init_tracing();
    let media = MockMedia::new(MediaBehavior::Grant);
    let (mut handle, mut emitted, factory) = start_session("doc1", media, CallConfig::default());

    let _ = recv_emitted(&mut emitted).await; // join-room
    handle
        .actions
        .send(teleconsult_client::UserAction::StartCall)
        .await
        .unwrap();
    let _ = recv_emitted(&mut emitted).await; // call-user

    // A track while still ringing is premature and must be dropped.
    let peer_events = factory.peer_events(0);
    peer_events
        .send(PeerEvent::RemoteTrack(RemoteTrack {
            id: "early".into(),
            kind: MediaKind::Video,
        }))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle
        .server_events
        .send(ServerEvent::AnswerMade {
            room: RoomId::from("r1"),
            signal_data: SessionDescription::answer("v=0 remote-answer"),
        })
        .await
        .unwrap();
    handle
        .state
        .wait_for(|s| *s == CallState::InCall)
        .await
        .unwrap();

    peer_events
        .send(PeerEvent::RemoteTrack(RemoteTrack {
            id: "track-1".into(),
            kind: MediaKind::Video,
        }))
        .await
        .unwrap();

    // Only the in-call track reaches the UI.
    let notification = handle.notifications.recv().await.unwrap();
    assert!(matches!(
        notification,
        CallNotification::RemoteTrack(ref track) if track.id == "track-1"
    ));
}
