use super::*;

#[test]
fn notice_levels() {
    assert_eq!(Notice::LoginSucceeded.level(), NoticeLevel::Success);
    assert_eq!(Notice::LoginFailed.level(), NoticeLevel::Error);
    assert_eq!(Notice::SessionExpired.level(), NoticeLevel::Warning);
}

#[test]
fn notice_messages_are_distinct() {
    let messages = [
        Notice::LoginSucceeded.message(),
        Notice::LoginFailed.message(),
        Notice::SessionExpired.message(),
    ];
    assert!(messages.iter().all(|m| !m.is_empty()));
    assert_ne!(messages[0], messages[1]);
    assert_ne!(messages[1], messages[2]);
}

#[test]
fn login_failure_message_mentions_code() {
    assert!(Notice::LoginFailed.message().contains("code"));
}
