//! Tests for bot user-agent detection

use super::*;

#[test]
fn test_crawlers_are_bots() {
    let agents = [
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        "Mozilla/5.0 (compatible; bingbot/2.0; +http://www.bing.com/bingbot.htm)",
        "facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)",
        "Mozilla/5.0 (compatible; Yahoo! Slurp; http://help.yahoo.com/help/us/ysearch/slurp)",
        "Baiduspider+(+http://www.baidu.com/search/spider.htm)",
        "WhatsApp/2.19.81 A",
        "curl/8.4.0",
        "python-requests/2.31.0",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) HeadlessChrome/120.0.0.0 Safari/537.36",
    ];

    for agent in agents {
        assert!(is_bot(Some(agent)), "expected bot: {}", agent);
    }
}

#[test]
fn test_browsers_are_not_bots() {
    let agents = [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
    ];

    for agent in agents {
        assert!(!is_bot(Some(agent)), "expected browser: {}", agent);
    }
}

#[test]
fn test_missing_user_agent_is_not_bot() {
    assert!(!is_bot(None));
    assert!(!is_bot(Some("")));
    assert!(!is_bot(Some("   ")));
}

#[test]
fn test_cubot_phones_are_not_bots() {
    let agents = [
        "Mozilla/5.0 (Linux; Android 10; Cubot X19 Build/QP1A.190711.020) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.104 Mobile Safari/537.36",
        "Mozilla/5.0 (Linux; Android 11; KINGKONG 5 Pro Build/RP1A.200720.011; CUBOT) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0.0.0 Mobile Safari/537.36",
    ];

    for agent in agents {
        assert!(!is_bot(Some(agent)), "expected browser: {}", agent);
    }
}

#[test]
fn test_crawler_on_cubot_device_is_still_bot() {
    let agent = "Mozilla/5.0 (Linux; Android 10; Cubot X19) AppleWebKit/537.36 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    assert!(is_bot(Some(agent)));
}
