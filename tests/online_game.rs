use std::sync::Arc;

use tic_tac_toe::board::{Cell, Symbol};
use tic_tac_toe::error::SessionError;
use tic_tac_toe::reconcile::{OnlineGame, Outcome};
use tic_tac_toe::remote::{GameService, MemoryStore};

fn service() -> (MemoryStore, GameService) {
    let store = MemoryStore::new();
    let service = GameService::new(Arc::new(store.clone()));
    (store, service)
}

#[tokio::test]
async fn two_clients_play_through_their_subscriptions() {
    let (_, service) = service();
    let game = service.create_game("p1", "Ana").await.unwrap();

    let mut host = OnlineGame::open(&service, &game.id, "p1");
    let view = host.next_view().await.unwrap();
    assert_eq!(view.outcome, Outcome::WaitingForOpponent);
    assert_eq!(view.opponent_display_name(), "Waiting for opponent");
    assert!(matches!(
        host.make_move(0).await,
        Err(SessionError::WaitingForOpponent)
    ));

    service.join_game(&game, "p2", "Luis").await.unwrap();
    let view = host.next_view().await.unwrap();
    assert_eq!(view.outcome, Outcome::MyTurn);
    assert_eq!(view.opponent_name.as_deref(), Some("Luis"));

    let mut guest = OnlineGame::open(&service, &game.id, "p2");
    let view = guest.next_view().await.unwrap();
    assert_eq!(view.outcome, Outcome::OpponentsTurn);
    assert_eq!(view.status_message(), "Ana's turn");
    assert!(matches!(guest.make_move(4).await, Err(SessionError::NotYourTurn)));
    assert_eq!(guest.take_error().as_deref(), Some("it is not your turn"));

    host.make_move(4).await.unwrap();
    let view = host.next_view().await.unwrap();
    assert_eq!(view.outcome, Outcome::OpponentsTurn);
    assert_eq!(view.board.get(4), Some(&Cell::HeldBy(Symbol::X)));

    let view = guest.next_view().await.unwrap();
    assert!(view.is_my_turn);
    assert_eq!(view.board.get(4), Some(&Cell::HeldBy(Symbol::X)));
    assert!(matches!(
        guest.make_move(4).await,
        Err(SessionError::OccupiedCell(4))
    ));

    guest.make_move(0).await.unwrap();
    guest.next_view().await.unwrap();

    host.next_view().await.unwrap();
    host.make_move(8).await.unwrap();
    host.next_view().await.unwrap();

    guest.next_view().await.unwrap();
    guest.make_move(1).await.unwrap();
    guest.next_view().await.unwrap();

    // O threatens the row through 2; X blocks and sets up two lines.
    host.next_view().await.unwrap();
    host.make_move(2).await.unwrap();
    host.next_view().await.unwrap();

    guest.next_view().await.unwrap();
    guest.make_move(5).await.unwrap();
    guest.next_view().await.unwrap();

    host.next_view().await.unwrap();
    host.make_move(6).await.unwrap();
    host.next_view().await.unwrap();

    let view = host.view().unwrap();
    assert_eq!(view.outcome, Outcome::IWon);
    assert_eq!(view.status_message(), "You won!");
    assert!(view.winning_line.is_some());

    let view = guest.next_view().await.unwrap();
    assert_eq!(view.outcome, Outcome::OpponentWon);
    assert_eq!(view.status_message(), "Ana won!");
    assert!(matches!(
        guest.make_move(7).await,
        Err(SessionError::GameFinished)
    ));
}

#[tokio::test]
async fn leaving_releases_the_subscription() {
    let (_, service) = service();
    let game = service.create_game("p1", "Ana").await.unwrap();

    let mut host = OnlineGame::open(&service, &game.id, "p1");
    host.next_view().await.unwrap();
    assert_eq!(service.subscription_count(&game.id), 1);

    host.leave();
    assert_eq!(service.subscription_count(&game.id), 0);
}

#[tokio::test]
async fn transport_failure_becomes_view_error() {
    let (store, service) = service();
    let game = service.create_game("p1", "Ana").await.unwrap();

    let mut host = OnlineGame::open(&service, &game.id, "p1");
    host.next_view().await.unwrap();

    store.disconnect().await;
    assert!(host.next_view().await.is_none());
    assert_eq!(
        host.last_error(),
        Some("store request failed: connection to the store was lost")
    );
    // The last good view is still there to render.
    assert_eq!(host.view().unwrap().outcome, Outcome::WaitingForOpponent);
}
