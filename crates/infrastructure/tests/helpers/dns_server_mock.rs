#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// In-process upstream resolver: answers every question with one A
/// record pointing at `answer`, and remembers the names it was asked.
pub struct MockDnsServer {
    addr: SocketAddr,
    answer: Ipv4Addr,
    shutdown: CancellationToken,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockDnsServer {
    pub async fn start(answer: Ipv4Addr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = socket.local_addr()?;
        let shutdown = CancellationToken::new();
        let queries = Arc::new(Mutex::new(Vec::new()));

        let token = shutdown.clone();
        let seen = queries.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    result = socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = result else { break };
                        if let Some(response) = build_response(&buf[..len], answer, &seen) {
                            let _ = socket.send_to(&response, peer).await;
                        }
                    }
                }
            }
        });

        Ok(Self {
            addr,
            answer,
            shutdown,
            queries,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    pub fn answer(&self) -> Ipv4Addr {
        self.answer
    }

    /// Names asked so far, in arrival order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn build_response(
    query: &[u8],
    answer: Ipv4Addr,
    seen: &Arc<Mutex<Vec<String>>>,
) -> Option<Vec<u8>> {
    let request = Message::from_vec(query).ok()?;
    let question = request.queries().first()?.clone();

    seen.lock().unwrap().push(question.name().to_utf8());

    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(request.op_code());
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(true);
    response.set_response_code(ResponseCode::NoError);
    response.add_query(question.clone());
    response.add_answer(Record::from_rdata(
        question.name().clone(),
        60,
        RData::A(A(answer)),
    ));

    response.to_vec().ok()
}
