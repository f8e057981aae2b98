use deepread::video::read_url_list;
use deepread::video_search::{
    VideoCandidate, parse_duration, parse_play_count, parse_search_response, rank_videos,
    write_links_file,
};
use serde_json::json;
use spectral::assert_that;
use spectral::boolean::BooleanAssertions;

fn candidate(bvid: &str, play_count: u64) -> VideoCandidate {
    VideoCandidate {
        bvid: bvid.to_string(),
        title: format!("Video {bvid}"),
        author: "reader".to_string(),
        duration_secs: 600,
        play_count,
        url: format!("https://www.bilibili.com/video/{bvid}"),
    }
}

#[test]
fn durations() {
    assert_that(&parse_duration("12:34")).is_equal_to(754);
    assert_that(&parse_duration("1:02:03")).is_equal_to(3723);
    assert_that(&parse_duration("soon")).is_equal_to(0);
    assert_that(&parse_duration("")).is_equal_to(0);
}

#[test]
fn play_counts() {
    assert_that(&parse_play_count("12345")).is_equal_to(12345);
    assert_that(&parse_play_count("1.2万")).is_equal_to(12000);
    assert_that(&parse_play_count("3千")).is_equal_to(3000);
    assert_that(&parse_play_count("n/a")).is_equal_to(0);
}

#[test]
fn response_filters_short_videos() {
    let response = json!({
        "code": 0,
        "data": {
            "result": [
                {
                    "bvid": "BV1long",
                    "title": "<em class=\"keyword\">兄弟</em> 书评",
                    "author": "reader",
                    "duration": "15:00",
                    "play": 5000
                },
                {
                    "bvid": "BV1short",
                    "title": "short",
                    "author": "reader",
                    "duration": "1:00",
                    "play": "2.5万"
                },
                { "title": "no id" }
            ]
        }
    });

    let videos = parse_search_response(&response, 300).expect("valid response");

    assert_that(&videos.len()).is_equal_to(1);
    assert_that(&videos[0].title).is_equal_to("兄弟 书评".to_string());
    assert_that(&videos[0].duration_secs).is_equal_to(900);
    assert_that(&videos[0].url).is_equal_to("https://www.bilibili.com/video/BV1long".to_string());
}

#[test]
fn response_with_error_code() {
    let response = json!({ "code": -412, "message": "request was banned" });

    assert_that(&parse_search_response(&response, 300).is_err()).is_true();
}

#[test]
fn ranking_dedups_and_sorts_by_plays() {
    let videos = vec![
        candidate("BV1a", 10),
        candidate("BV1b", 300),
        candidate("BV1a", 10),
        candidate("BV1c", 20),
    ];

    let ranked: Vec<String> = rank_videos(videos, 2)
        .into_iter()
        .map(|video| video.bvid)
        .collect();

    assert_that(&ranked).is_equal_to(vec!["BV1b".to_string(), "BV1c".to_string()]);
}

#[test]
fn links_file_is_readable_as_url_list() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("video_links.txt");

    write_links_file(&path, "兄弟", &[candidate("BV1a", 10), candidate("BV1b", 5)])
        .expect("links file is written");

    assert_that(&read_url_list(&path).expect("list is readable")).is_equal_to(vec![
        "https://www.bilibili.com/video/BV1a".to_string(),
        "https://www.bilibili.com/video/BV1b".to_string(),
    ]);
}
