//! Session commands.

#![allow(clippy::print_stdout)]

use bramble_market_client::StorefrontSession;
use bramble_market_client::auth::SignupRequest;

/// Log in, then run the one-time cart merge for the login transition.
pub async fn login(
    session: &StorefrontSession,
    username: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    session.auth().login(username, password).await?;
    session.cart().sync_with_server().await;
    println!(
        "Logged in as {username} ({} items in cart).",
        session.cart().item_count()
    );
    Ok(())
}

/// Create an account, log in, and merge the anonymous cart.
pub async fn signup(
    session: &StorefrontSession,
    username: String,
    email: String,
    password: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = SignupRequest {
        username: username.clone(),
        email,
        password,
    };
    session.auth().signup(&request).await?;
    session.cart().sync_with_server().await;
    println!("Welcome, {username}.");
    Ok(())
}

/// Drop the session. The device-local cart copy goes with it; the
/// server-side cart is untouched.
pub fn logout(session: &StorefrontSession) {
    session.auth().logout();
    println!("Logged out.");
}

/// Print the current session identity.
pub fn whoami(session: &StorefrontSession) {
    if !session.auth().has_valid_token() {
        println!("Not logged in.");
        return;
    }
    let username = session.auth().username().unwrap_or_else(|| "?".to_string());
    match session.auth().user_id() {
        Ok(user_id) => println!(
            "{username} (user {user_id}{})",
            if session.auth().is_admin() { ", admin" } else { "" }
        ),
        Err(_) => println!("{username}"),
    }
}
