use boring::pkey::PKey;
use boring::ssl::{select_next_proto, AlpnError, SslAcceptor, SslMethod};
use boring::x509::X509;

/// BoringSSL acceptor with a self-signed certificate for 127.0.0.1 that
/// selects from `server_protos` (ALPN wire format) when the client offers ALPN.
pub fn acceptor(server_protos: &'static [u8]) -> SslAcceptor {
    let subject_alt_names = vec!["127.0.0.1".to_string(), "localhost".to_string()];

    let cert =
        rcgen::generate_simple_self_signed(subject_alt_names).expect("Failed to generate cert");
    let cert_pem = cert.cert.pem();
    let key_pem = cert.signing_key.serialize_pem();

    let pkey = PKey::private_key_from_pem(key_pem.as_bytes()).expect("Failed to parse private key");
    let x509 = X509::from_pem(cert_pem.as_bytes()).expect("Failed to parse certificate");

    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())
        .expect("Failed to create SslAcceptor builder");
    builder
        .set_private_key(&pkey)
        .expect("Failed to set private key");
    builder
        .set_certificate(&x509)
        .expect("Failed to set certificate");
    builder.set_alpn_select_callback(move |_, client_protos| {
        select_next_proto(server_protos, client_protos).ok_or(AlpnError::NOACK)
    });
    builder.build()
}
