#[macro_export]
macro_rules! assert_next_batch {
    ($stream: expr, $expected: expr) => {
        assert_next_batch!($stream, $expected, timeout = 5)
    };
    ($stream: expr, $expected: expr, timeout = $secs: expr) => {
        let item = tokio::time::timeout(std::time::Duration::from_secs($secs), $stream.next())
            .await
            .expect("timed out");
        match item {
            Some(Ok(batch)) => {
                let expected: Vec<u64> = $expected.into_iter().collect();
                assert_eq!(batch.block_numbers(), expected);
            }
            Some(Err(e)) => panic!("Expected batch {:?}, got error: {e}", $expected),
            None => panic!("Expected batch {:?}, but stream ended", $expected),
        }
    };
}

#[macro_export]
macro_rules! assert_batch_error {
    ($stream: expr, $pattern: pat) => {
        assert_batch_error!($stream, $pattern, timeout = 5)
    };
    ($stream: expr, $pattern: pat, timeout = $secs: expr) => {
        let item = tokio::time::timeout(std::time::Duration::from_secs($secs), $stream.next())
            .await
            .expect("timed out");
        match item {
            Some(Err($pattern)) => {}
            Some(Err(e)) => panic!("Error did not match expected pattern: {e}"),
            Some(Ok(batch)) => panic!("Expected an error, got batch of {} blocks", batch.blocks.len()),
            None => panic!("Expected an error, but stream ended"),
        }
    };
}

#[macro_export]
macro_rules! assert_stream_done {
    ($stream: expr) => {
        assert_stream_done!($stream, timeout = 5)
    };
    ($stream: expr, timeout = $secs: expr) => {
        let item = tokio::time::timeout(std::time::Duration::from_secs($secs), $stream.next())
            .await
            .expect("timed out");
        assert!(item.is_none(), "Expected end of stream, got: {item:?}");
    };
}

#[macro_export]
macro_rules! assert_no_batch {
    ($stream: expr, for_millis = $millis: expr) => {
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis($millis), $stream.next()).await;
        assert!(waited.is_err(), "Expected no batch within {}ms, got: {:?}", $millis, waited);
    };
}
