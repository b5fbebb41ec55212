/*
 * Responsibility
 * - Public interface of the middleware layers
 */
pub mod http;
pub mod token_dispatcher;
