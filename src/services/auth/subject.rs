use serde_json::{Map, Value};

/// A user representation that can be encoded into a bearer token.
pub trait JwtSubject {
    /// Value of the `sub` claim.
    fn jwt_subject(&self) -> String;

    /// Extra claims merged over the defaults.
    fn jwt_payload(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Optional capability: users that want to observe dispatched tokens
    /// return themselves here.
    fn dispatch_observer(&self) -> Option<&dyn OnJwtDispatch> {
        None
    }
}

/// Notified right before a freshly minted token is handed to the request.
pub trait OnJwtDispatch {
    fn on_jwt_dispatch(&self, token: &str, payload: &Map<String, Value>);
}
