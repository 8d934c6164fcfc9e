use devbuf::control::GET_STATUS;
use devbuf::{
    BufferStatus, ControlRequest, ControlResponse, Device, DeviceError, DeviceService, WriteMode,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_write_read_through_service() {
    init_tracing();
    let service = DeviceService::new(Device::default());
    let client = service.client();
    let task = tokio::spawn(service.run());

    let s = client.open().await.unwrap();
    assert_eq!(client.write(b"Hello".to_vec()).await.unwrap(), 5);
    assert_eq!(client.read(s, 10).await.unwrap(), b"Hello");
    assert!(client.read(s, 10).await.unwrap().is_empty());
    client.close(s).await.unwrap();

    drop(client);
    let device = task.await.unwrap();
    assert_eq!(device.get_open_count(), 1);
    assert_eq!(device.sessions().session_count(), 0);
}

#[tokio::test]
async fn test_requests_are_serialized_in_order() {
    let service = DeviceService::new(Device::default());
    let client = service.client();
    let task = tokio::spawn(service.run());

    let s = client.open().await.unwrap();
    client
        .control(s, ControlRequest::SetMode(WriteMode::Append))
        .await
        .unwrap();

    let writers: Vec<_> = (0..4u8)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                for _ in 0..25 {
                    client.write(vec![b'0' + i; 4]).await.unwrap();
                }
            })
        })
        .collect();
    for w in writers {
        w.await.unwrap();
    }

    assert_eq!(
        client.control(s, ControlRequest::GetStatus).await.unwrap(),
        ControlResponse::Status(BufferStatus { used: 400, free: 624 })
    );
    let data = client.read(s, 1024).await.unwrap();
    for record in data.chunks(4) {
        assert!(record.iter().all(|&b| b == record[0]));
    }

    drop(client);
    task.await.unwrap();
}

#[tokio::test]
async fn test_ioctl_through_service() {
    let service = DeviceService::new(Device::default());
    let client = service.client();
    let task = tokio::spawn(service.run());

    let s = client.open().await.unwrap();
    client.write("HELLO").await.unwrap();
    let status = client.ioctl(s, GET_STATUS, &[]).await.unwrap();
    assert_eq!(status.len(), 8);
    assert_eq!(i32::from_ne_bytes(status[..4].try_into().unwrap()), 5);

    assert!(matches!(
        client.control(s, ControlRequest::SetBufferSize(0)).await,
        Err(DeviceError::InvalidSize { .. })
    ));

    drop(client);
    task.await.unwrap();
}

#[tokio::test]
async fn test_client_after_service_stopped() {
    let service = DeviceService::new(Device::default());
    let client = service.client();
    drop(service);

    assert_eq!(client.open().await, Err(DeviceError::ServiceStopped));
}

#[tokio::test]
async fn test_run_ends_with_last_client() {
    let service = DeviceService::new(Device::default());
    let first = service.client();
    let task = tokio::spawn(service.run());

    let second = first.clone();
    drop(first);
    let s = second.open().await.unwrap();
    assert_eq!(second.write("still served").await.unwrap(), 12);
    assert_eq!(second.read(s, 5).await.unwrap(), b"still");

    drop(second);
    let device = task.await.unwrap();
    assert_eq!(device.sessions().session_count(), 1);
}

#[tokio::test]
async fn test_run_without_clients_returns_at_once() {
    let device = DeviceService::new(Device::default()).run().await;
    assert_eq!(device.get_open_count(), 0);
}
