//! Integration tests for the TCP-attached serial port.
//!
//! Each test binds a throwaway listener on localhost and drives the port
//! against a real socket.

use athost_core::{PortError, SerialPort};
use athost_transport::TcpPort;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

#[test]
fn test_get_and_put_roundtrip() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        conn.write_all(b"OK\r\n").unwrap();
        let mut buf = [0u8; 2];
        conn.read_exact(&mut buf).unwrap();
        buf
    });

    let mut port = TcpPort::connect(addr).unwrap();
    port.init(Duration::from_millis(1000)).unwrap();

    let mut got = Vec::new();
    for _ in 0..4 {
        got.push(port.get(Duration::from_millis(1000)).unwrap());
    }
    assert_eq!(got, b"OK\r\n".to_vec());

    port.put(b'A').unwrap();
    port.put(b'T').unwrap();
    assert_eq!(&server.join().unwrap(), b"AT");
}

#[test]
fn test_get_times_out_without_data() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut port = TcpPort::connect(addr).unwrap();
    let err = port.get(Duration::from_millis(50)).unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn test_closed_peer_is_not_a_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut port = TcpPort::connect(addr).unwrap();
    let (conn, _) = listener.accept().unwrap();
    drop(conn);

    let err = port.get(Duration::from_millis(1000)).unwrap_err();
    assert!(matches!(err, PortError::Closed));
}

#[test]
fn test_readable_probe_does_not_consume() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let mut port = TcpPort::connect(addr).unwrap();
    let (mut conn, _) = listener.accept().unwrap();

    assert!(!port.readable());

    conn.write_all(b"X").unwrap();
    // Loopback delivery is quick but not instantaneous.
    let mut tries = 0;
    while !port.readable() && tries < 100 {
        thread::sleep(Duration::from_millis(10));
        tries += 1;
    }
    assert!(port.readable());

    assert_eq!(port.get(Duration::from_millis(1000)).unwrap(), b'X');
    assert!(!port.readable());
}
