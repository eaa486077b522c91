//! Account writes racing each other on one SQLite file.

use std::sync::Arc;

use tempfile::TempDir;
use tokio::task::JoinSet;

use cinevibes_core::{
    accounts::RegisterRequest,
    testing::fixtures::{self, TEST_HASH_COST},
    AuthController,
};

const USERS: usize = 40;
const ROUNDS: usize = 5;

async fn register_all(accounts: &AuthController) -> Vec<(i64, String, String)> {
    let mut users = Vec::with_capacity(USERS);
    for i in 0..USERS {
        let email = format!("user{}@example.com", i);
        let registration = accounts
            .register(RegisterRequest {
                nickname: format!("user{}", i),
                email: email.clone(),
                password: fixtures::TEST_PASSWORD.to_string(),
            })
            .await
            .expect("register failed");
        users.push((registration.user_id, email, registration.verification_code));
    }
    users
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_verify_and_avatar_updates() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = fixtures::test_database(temp_dir.path()).await;
    let accounts = Arc::new(AuthController::new(db, TEST_HASH_COST));
    let users = register_all(&accounts).await;

    let mut tasks = JoinSet::new();
    for (index, (user_id, email, code)) in users.iter().cloned().enumerate() {
        let accounts = Arc::clone(&accounts);
        tasks.spawn(async move {
            let mut code = code;
            // Half the users ask for a new code first
            if index % 2 == 1 {
                code = accounts
                    .reissue_verification_code(&email)
                    .await?
                    .expect("unverified user gets a new code");
            }
            for round in 0..ROUNDS {
                assert!(accounts.verify_code(&email, &code).await?);
                accounts
                    .update_profile_pic(user_id, &format!("avatar_{}_{}.png", user_id, round))
                    .await?;
            }
            Ok::<_, cinevibes_core::AccountError>(())
        });
    }

    let mut errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined.expect("task panicked") {
            errors.push(e.to_string());
        }
    }
    assert!(errors.is_empty(), "{} writes failed: {:?}", errors.len(), errors);

    for (user_id, email, _) in &users {
        let profile = accounts.get_user_profile(*user_id).await.unwrap().unwrap();
        assert!(profile.is_verified, "{} not verified", email);
        assert_eq!(
            profile.profile_pic.as_deref(),
            Some(format!("avatar_{}_{}.png", user_id, ROUNDS - 1).as_str())
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_reissue_leaves_one_valid_code() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = fixtures::test_database(temp_dir.path()).await;
    let accounts = Arc::new(AuthController::new(db, TEST_HASH_COST));
    let users = register_all(&accounts).await;
    let (_, email, _) = users[0].clone();

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let accounts = Arc::clone(&accounts);
        let email = email.clone();
        tasks.spawn(async move { accounts.reissue_verification_code(&email).await });
    }

    let mut codes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let code = joined.expect("task panicked").expect("reissue failed");
        codes.push(code.expect("unverified user gets a new code"));
    }

    // The code stored last is among those handed out
    let mut matched = 0;
    for code in &codes {
        if accounts.verify_code(&email, code).await.unwrap() {
            matched += 1;
            break;
        }
    }
    assert_eq!(matched, 1);
    assert!(accounts
        .reissue_verification_code(&email)
        .await
        .unwrap()
        .is_none());
}
