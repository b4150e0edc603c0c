use hls_proxy::rewriter::{naive_join, resolve_url, rewrite_playlist};
use hls_proxy::{token, LineRewrite, PlaylistRewriter, RequestDescriptor};

const PROXY_BASE: &str = "https://proxy.example";

fn entry(url: &str) -> RequestDescriptor {
    RequestDescriptor::new(url)
        .with_origin("https://site.example")
        .with_referer("https://site.example/watch/1")
        .entry_playlist()
}

/// Decode a rewritten line back into its descriptor
fn decode_line(line: &str) -> RequestDescriptor {
    let raw = line
        .strip_prefix("https://proxy.example/url/")
        .unwrap_or_else(|| panic!("line was not rewritten: {}", line));
    token::decode(raw).unwrap()
}

#[test]
fn test_resolve_relative_references() {
    let base = "https://cdn.example.com/live/stream/index.m3u8?auth=xyz";

    assert_eq!(
        resolve_url(base, "seg_001.ts"),
        "https://cdn.example.com/live/stream/seg_001.ts"
    );
    assert_eq!(
        resolve_url(base, "../audio/en.m3u8"),
        "https://cdn.example.com/live/audio/en.m3u8"
    );
    assert_eq!(
        resolve_url(base, "/root/seg.ts"),
        "https://cdn.example.com/root/seg.ts"
    );
    assert_eq!(
        resolve_url(base, "//mirror.example.net/seg.ts"),
        "https://mirror.example.net/seg.ts"
    );
    assert_eq!(
        resolve_url(base, "seg.ts?part=2"),
        "https://cdn.example.com/live/stream/seg.ts?part=2"
    );
}

#[test]
fn test_absolute_reference_unchanged() {
    let absolute = "http://other.example/path/seg 1.ts";
    assert_eq!(resolve_url("https://cdn.example.com/a.m3u8", absolute), absolute);
}

#[test]
fn test_naive_join_fallback() {
    assert_eq!(
        naive_join("https://cdn.example.com/live/index.m3u8", "seg.ts"),
        "https://cdn.example.com/live/seg.ts"
    );
    assert_eq!(
        naive_join("https://cdn.example.com", "seg.ts"),
        "https://cdn.example.com/seg.ts"
    );
    assert_eq!(
        naive_join("https://cdn.example.com/live/index.m3u8", "/seg.ts"),
        "https://cdn.example.com/seg.ts"
    );
    assert_eq!(naive_join("not a url", "seg.ts"), "seg.ts");
}

#[test]
fn test_master_playlist_end_to_end() {
    let playlist = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
low/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=2400000,RESOLUTION=1280x720\n\
https://cdn2.example.com/hi/index.m3u8?token=abc\n";

    let origin = entry("https://cdn.example.com/live/master.m3u8");
    let output = rewrite_playlist(playlist, &origin, PROXY_BASE);
    let lines: Vec<&str> = output.split('\n').collect();

    assert_eq!(lines.len(), 7);
    assert_eq!(lines[0], "#EXTM3U");
    assert_eq!(lines[1], "#EXT-X-VERSION:3");
    assert_eq!(lines[2], "#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360");
    assert_eq!(lines[6], "");

    assert!(lines[3].ends_with(".m3u8"));
    let low = decode_line(lines[3]);
    assert_eq!(low.url, "https://cdn.example.com/live/low/index.m3u8");
    assert_eq!(low.origin.as_deref(), Some("https://site.example"));
    assert_eq!(low.referer.as_deref(), Some("https://site.example/watch/1"));
    assert!(!low.is_entry_playlist);

    assert!(lines[5].ends_with(".m3u8"));
    let hi = decode_line(lines[5]);
    assert_eq!(hi.url, "https://cdn2.example.com/hi/index.m3u8?token=abc");
}

#[test]
fn test_media_playlist_segments() {
    let playlist = "#EXTM3U\r\n\
#EXT-X-TARGETDURATION:6\r\n\
#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\r\n\
#EXTINF:6.0,\r\n\
  seg-0.ts  \r\n\
#EXTINF:6.0,\r\n\
seg-1.m4s?range=0-100\r\n\
#EXT-X-ENDLIST";

    let origin = entry("https://cdn.example.com/vod/v1/prog.m3u8");
    let output = rewrite_playlist(playlist, &origin, PROXY_BASE);
    let lines: Vec<&str> = output.split('\n').collect();

    assert!(!output.contains('\r'));
    assert_eq!(lines[2], "#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"");
    assert_eq!(lines[7], "#EXT-X-ENDLIST");

    assert!(!lines[4].ends_with(".m3u8"));
    assert_eq!(decode_line(lines[4]).url, "https://cdn.example.com/vod/v1/seg-0.ts");
    assert_eq!(
        decode_line(lines[6]).url,
        "https://cdn.example.com/vod/v1/seg-1.m4s?range=0-100"
    );
}

#[test]
fn test_playlist_hint_only_for_playlist_paths() {
    let origin = entry("https://cdn.example.com/live/master.m3u8");
    let rewriter = PlaylistRewriter::new(&origin, "https://proxy.example/");

    // Query strings mentioning .m3u8 do not make a segment a playlist
    match rewriter.rewrite_line("seg.ts?from=list.m3u8") {
        LineRewrite::Rewritten(line) => {
            assert!(line.starts_with("https://proxy.example/url/"));
            assert!(!line.ends_with(".m3u8"));
        }
        LineRewrite::Unchanged => panic!("reference should be rewritten"),
    }
}

#[test]
fn test_unrecognised_lines_left_alone() {
    let origin = entry("https://cdn.example.com/live/master.m3u8");
    let playlist = "#EXTM3U\nsome stray text\nreadme.txt\n";

    assert_eq!(rewrite_playlist(playlist, &origin, PROXY_BASE), playlist);
}

#[test]
fn test_headers_absent_stay_absent() {
    let origin = RequestDescriptor::new("https://cdn.example.com/live/index.m3u8").entry_playlist();
    let output = rewrite_playlist("#EXTM3U\nseg.ts", &origin, PROXY_BASE);
    let segment = decode_line(output.lines().nth(1).unwrap());

    assert_eq!(segment.origin, None);
    assert_eq!(segment.referer, None);
}

#[test]
fn test_unparseable_base_with_query_resolves() {
    assert_eq!(resolve_url("http://a b?x", "seg.ts"), "http://a b/seg.ts");
    assert_eq!(resolve_url("http://a b?x", "/root/seg.ts"), "http://a b/root/seg.ts");
    assert_eq!(naive_join("http://a b#frag", "seg.ts"), "http://a b/seg.ts");
    assert_eq!(naive_join("http://a b/dir/list.m3u8?x=/y", "seg.ts"), "http://a b/dir/seg.ts");
}

#[test]
fn test_rewrite_over_unparseable_base_with_query() {
    let origin = RequestDescriptor::new("http://a b?x").entry_playlist();
    let output = rewrite_playlist("#EXTM3U\nseg.ts\n", &origin, "http://p");
    let lines: Vec<&str> = output.split('\n').collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "#EXTM3U");
    assert_eq!(lines[2], "");

    let raw = lines[1].strip_prefix("http://p/url/").unwrap();
    assert_eq!(token::decode(raw).unwrap().url, "http://a b/seg.ts");
}
