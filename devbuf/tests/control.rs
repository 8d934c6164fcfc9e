use devbuf::control::{CLEAR_BUFFER, GET_MIRROR, SET_APPEND_MODE, SET_BUFFER_SIZE};
use devbuf::{BufferStatus, ControlRequest, ControlResponse, Device, DeviceError, WriteMode};

fn int(n: i32) -> [u8; 4] {
    n.to_ne_bytes()
}

#[test]
fn test_set_append_mode_raw() {
    let device = Device::default();
    let s = device.open().unwrap();

    device.ioctl(s, SET_APPEND_MODE, &int(1)).unwrap();
    assert_eq!(device.buffer().mode(), WriteMode::Append);
    device.write(b"AB").unwrap();
    device.write(b"CD").unwrap();
    assert_eq!(device.read(s, 8).unwrap(), b"ABCD");

    device.ioctl(s, SET_APPEND_MODE, &int(0)).unwrap();
    assert_eq!(device.buffer().mode(), WriteMode::Overwrite);
    device.write(b"XY").unwrap();
    assert_eq!(device.get_status(), BufferStatus { used: 2, free: 1022 });
}

#[test]
fn test_raw_codes_agree_with_requests() {
    let requests = [
        ControlRequest::ClearBuffer,
        ControlRequest::GetStatus,
        ControlRequest::ResetOffset,
        ControlRequest::SetBufferSize(2048),
        ControlRequest::GetOpenCount,
        ControlRequest::GetMirror,
        ControlRequest::ClearRange { start: 3, end: 9 },
        ControlRequest::SetMode(WriteMode::Append),
    ];
    for request in requests {
        let decoded = ControlRequest::decode(request.code(), &request.encode_arg()).unwrap();
        assert_eq!(decoded, request, "code {:#x}", request.code());
    }
}

#[test]
fn test_oversized_argument_uses_prefix() {
    let mut arg = int(512).to_vec();
    arg.extend_from_slice(&int(7));
    assert_eq!(
        ControlRequest::decode(SET_BUFFER_SIZE, &arg).unwrap(),
        ControlRequest::SetBufferSize(512)
    );
}

#[test]
fn test_ioctl_reply_bytes() {
    let device = Device::default();
    let s = device.open().unwrap();
    device.write(b"abc").unwrap();

    assert_eq!(device.ioctl(s, GET_MIRROR, &[]).unwrap(), b"cba");
    assert!(device.ioctl(s, CLEAR_BUFFER, &[]).unwrap().is_empty());
    assert!(device.ioctl(s, GET_MIRROR, &[]).unwrap().is_empty());
}

#[test]
fn test_failed_ioctl_changes_nothing() {
    let device = Device::default();
    let s = device.open().unwrap();
    device.write(b"keep").unwrap();

    let err = device.ioctl(s, SET_BUFFER_SIZE, &int(9000)).unwrap_err();
    assert!(matches!(err, DeviceError::InvalidSize { requested: 9000, .. }));
    assert_eq!(err.errno(), 22);
    assert_eq!(device.buffer().capacity(), 1024);
    assert_eq!(device.read(s, 8).unwrap(), b"keep");
}

#[test]
fn test_response_encoding() {
    let status = ControlResponse::Status(BufferStatus { used: 5, free: 1019 }).encode();
    assert_eq!(&status[..4], &int(5));
    assert_eq!(&status[4..], &int(1019));
    assert_eq!(ControlResponse::OpenCount(3).encode(), int(3));
    assert!(ControlResponse::Done.encode().is_empty());
}
