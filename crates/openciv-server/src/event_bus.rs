//! Named publish/subscribe dispatch.
//!
//! The bus is owned by its host (the session registry) but callbacks need
//! mutable access to that same host. `publish` therefore snapshots the
//! matching callbacks first, releases the borrow, and then runs each one
//! against `&mut host`. A registration removed mid-dispatch (for example by a
//! phase transition triggered from an earlier listener) is skipped.

use std::rc::Rc;

use openciv_protocol::{ClientHandle, ClientMessage};
use tracing::{trace, warn};

use crate::game::GameError;
use crate::player::PlayerError;

/// Internal event names that never arrive as client frames.
pub mod events {
    /// A transport connected.
    pub const CONNECTION: &str = "connection";
    /// A player's transport closed and the player was removed.
    pub const PLAYER_QUIT: &str = "playerQuit";
}

/// Token returned by [`EventBus::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Who a registration belongs to, for bulk teardown.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Session-wide listeners installed by the registry itself.
    Session,
    Phase(&'static str),
    Player(ClientHandle),
}

/// What a listener receives alongside the event name.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Connection,
    Message(ClientMessage),
    PlayerQuit { player_name: String },
}

/// A single dispatched event.
#[derive(Debug)]
pub struct Event<'a> {
    pub name: &'a str,
    pub payload: &'a Payload,
    /// Transport the event originated from, if any.
    pub source: Option<ClientHandle>,
}

/// Failure inside one listener. Logged by [`publish`]; never aborts dispatch.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("no player bound to {0}")]
    UnknownClient(ClientHandle),
    #[error("event `{event}` carried an unexpected payload")]
    UnexpectedPayload { event: String },
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Player(#[from] PlayerError),
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BusError {
    #[error("event name must not be empty")]
    EmptyEventName,
}

pub type Callback<C> = Rc<dyn Fn(&mut C, &Event<'_>) -> Result<(), ListenerError>>;

struct Registration<C> {
    id: ListenerId,
    event: String,
    owner: Option<Owner>,
    global: bool,
    callback: Callback<C>,
}

/// Registry of listeners, dispatched against a host context `C`.
pub struct EventBus<C> {
    registrations: Vec<Registration<C>>,
    next_id: u64,
}

/// Implemented by whatever owns the bus so [`publish`] can reach it.
pub trait BusHost: Sized {
    fn bus(&self) -> &EventBus<Self>;
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> EventBus<C> {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            next_id: 0,
        }
    }

    /// Add a listener for `event`. Duplicate registrations are allowed and
    /// fire in registration order.
    pub fn register<F>(
        &mut self,
        event: &str,
        owner: Option<Owner>,
        global: bool,
        callback: F,
    ) -> Result<ListenerId, BusError>
    where
        F: Fn(&mut C, &Event<'_>) -> Result<(), ListenerError> + 'static,
    {
        if event.is_empty() {
            return Err(BusError::EmptyEventName);
        }
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration {
            id,
            event: event.to_owned(),
            owner,
            global,
            callback: Rc::new(callback),
        });
        Ok(id)
    }

    /// Drop every registration owned by `owner`. Returns how many were removed.
    pub fn unregister_all(&mut self, owner: &Owner) -> usize {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.owner.as_ref() != Some(owner));
        before - self.registrations.len()
    }

    /// Drop registrations by token. Unknown tokens are ignored.
    pub fn unregister<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = ListenerId>,
    {
        let ids: Vec<ListenerId> = ids.into_iter().collect();
        let before = self.registrations.len();
        self.registrations.retain(|r| !ids.contains(&r.id));
        before - self.registrations.len()
    }

    /// Drop every global registration.
    pub fn clear_global(&mut self) -> usize {
        let before = self.registrations.len();
        self.registrations.retain(|r| !r.global);
        before - self.registrations.len()
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        self.registrations.iter().any(|r| r.id == id)
    }

    pub fn count_owned_by(&self, owner: &Owner) -> usize {
        self.registrations
            .iter()
            .filter(|r| r.owner.as_ref() == Some(owner))
            .count()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    fn matching(&self, event: &str) -> Vec<(ListenerId, Callback<C>)> {
        self.registrations
            .iter()
            .filter(|r| r.event == event)
            .map(|r| (r.id, Rc::clone(&r.callback)))
            .collect()
    }
}

/// Invoke every listener registered for `name` against `host`, in
/// registration order. Returns the number of listeners that ran.
pub fn publish<C: BusHost>(
    host: &mut C,
    name: &str,
    payload: &Payload,
    source: Option<ClientHandle>,
) -> usize {
    let listeners = host.bus().matching(name);
    if listeners.is_empty() {
        trace!(event = name, "no listeners");
        return 0;
    }

    let event = Event {
        name,
        payload,
        source,
    };
    let mut fired = 0;
    for (id, callback) in listeners {
        if !host.bus().is_registered(id) {
            trace!(event = name, listener = id.0, "listener removed during dispatch");
            continue;
        }
        fired += 1;
        if let Err(err) = callback(host, &event) {
            warn!(event = name, listener = id.0, error = %err, "listener failed");
        }
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Host {
        bus: EventBus<Host>,
        log: Vec<String>,
    }

    impl BusHost for Host {
        fn bus(&self) -> &EventBus<Self> {
            &self.bus
        }
    }

    fn logger(tag: &'static str) -> impl Fn(&mut Host, &Event<'_>) -> Result<(), ListenerError> {
        move |host, _| {
            host.log.push(tag.to_owned());
            Ok(())
        }
    }

    #[test]
    fn fires_in_registration_order_including_duplicates() {
        let mut host = Host::default();
        host.bus.register("ping", None, false, logger("a")).unwrap();
        host.bus.register("ping", None, false, logger("b")).unwrap();
        host.bus.register("ping", None, false, logger("a")).unwrap();
        host.bus.register("pong", None, false, logger("x")).unwrap();

        let fired = publish(&mut host, "ping", &Payload::Connection, None);
        assert_eq!(fired, 3);
        assert_eq!(host.log, vec!["a", "b", "a"]);
    }

    #[test]
    fn empty_event_name_rejected() {
        let mut host = Host::default();
        let err = host.bus.register("", None, false, logger("a")).unwrap_err();
        assert_eq!(err, BusError::EmptyEventName);
        assert!(host.bus.is_empty());
    }

    #[test]
    fn unknown_event_has_no_listeners() {
        let mut host = Host::default();
        host.bus.register("ping", None, false, logger("a")).unwrap();
        assert_eq!(publish(&mut host, "nobody", &Payload::Connection, None), 0);
        assert!(host.log.is_empty());
    }

    #[test]
    fn unregister_all_only_touches_owner() {
        let mut host = Host::default();
        let lobby = Owner::Phase("lobby");
        let player = Owner::Player(ClientHandle(7));
        host.bus
            .register("ping", Some(lobby.clone()), false, logger("lobby"))
            .unwrap();
        host.bus
            .register("ping", Some(player.clone()), true, logger("player"))
            .unwrap();

        assert_eq!(host.bus.unregister_all(&lobby), 1);
        assert_eq!(host.bus.unregister_all(&lobby), 0);

        publish(&mut host, "ping", &Payload::Connection, None);
        assert_eq!(host.log, vec!["player"]);
        assert_eq!(host.bus.count_owned_by(&player), 1);
    }

    #[test]
    fn unregister_by_token() {
        let mut host = Host::default();
        let a = host.bus.register("ping", None, false, logger("a")).unwrap();
        host.bus.register("ping", None, false, logger("b")).unwrap();

        assert_eq!(host.bus.unregister([a]), 1);
        assert!(!host.bus.is_registered(a));
        publish(&mut host, "ping", &Payload::Connection, None);
        assert_eq!(host.log, vec!["b"]);
    }

    #[test]
    fn clear_global_keeps_scoped_listeners() {
        let mut host = Host::default();
        host.bus.register("ping", None, true, logger("global")).unwrap();
        host.bus
            .register("ping", Some(Owner::Phase("lobby")), false, logger("scoped"))
            .unwrap();

        assert_eq!(host.bus.clear_global(), 1);
        publish(&mut host, "ping", &Payload::Connection, None);
        assert_eq!(host.log, vec!["scoped"]);
    }

    #[test]
    fn listener_removed_mid_dispatch_does_not_fire() {
        let mut host = Host::default();
        let owner = Owner::Phase("lobby");
        let victim_owner = owner.clone();
        host.bus
            .register("ping", None, false, move |host: &mut Host, _: &Event<'_>| {
                host.log.push("teardown".into());
                host.bus.unregister_all(&victim_owner);
                Ok(())
            })
            .unwrap();
        host.bus
            .register("ping", Some(owner), false, logger("stale"))
            .unwrap();

        let fired = publish(&mut host, "ping", &Payload::Connection, None);
        assert_eq!(fired, 1);
        assert_eq!(host.log, vec!["teardown"]);
    }

    #[test]
    fn failing_listener_does_not_stop_dispatch() {
        let mut host = Host::default();
        host.bus
            .register("ping", None, false, |_: &mut Host, e: &Event<'_>| {
                Err(ListenerError::UnexpectedPayload {
                    event: e.name.to_owned(),
                })
            })
            .unwrap();
        host.bus.register("ping", None, false, logger("after")).unwrap();

        assert_eq!(publish(&mut host, "ping", &Payload::Connection, None), 2);
        assert_eq!(host.log, vec!["after"]);
    }

    #[test]
    fn source_is_passed_through() {
        let mut host = Host::default();
        host.bus
            .register("ping", None, false, |host: &mut Host, e: &Event<'_>| {
                host.log.push(format!("{:?}", e.source));
                Ok(())
            })
            .unwrap();
        publish(&mut host, "ping", &Payload::Connection, Some(ClientHandle(3)));
        assert_eq!(host.log, vec!["Some(ClientHandle(3))"]);
    }
}
